//! Workload and reference kind classification.
//!
//! Deploy targets are classified by keyword match against the synthesized
//! job name. Each keyword is tested independently and the first match wins;
//! the priority order puts longer keywords first so that a `cronjob`
//! manifest is never classified as a plain `job`.

use serde::{Deserialize, Serialize};

/// Kubernetes workload kinds that carry pods and therefore need a
/// delete-then-apply rollout when their manifest or an image changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    CronJob,
    DaemonSet,
    StatefulSet,
    ReplicaSet,
    Deployment,
    Pod,
    Job,
}

/// Detection order: most specific keyword first.
const WORKLOAD_KEYWORDS: &[(&str, WorkloadKind)] = &[
    ("cronjob", WorkloadKind::CronJob),
    ("daemonset", WorkloadKind::DaemonSet),
    ("statefulset", WorkloadKind::StatefulSet),
    ("replicaset", WorkloadKind::ReplicaSet),
    ("deployment", WorkloadKind::Deployment),
    ("pod", WorkloadKind::Pod),
    ("job", WorkloadKind::Job),
];

impl WorkloadKind {
    /// Classify a job name. Returns `None` for non-workload resources
    /// (services, config maps, ingresses, ...).
    pub fn detect(job_name: &str) -> Option<WorkloadKind> {
        let name = job_name.to_ascii_lowercase();
        WORKLOAD_KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, kind)| *kind)
    }

    /// The resource name as kubectl expects it.
    pub fn kubectl_name(&self) -> &'static str {
        match self {
            WorkloadKind::CronJob => "cronjob",
            WorkloadKind::DaemonSet => "daemonset",
            WorkloadKind::StatefulSet => "statefulset",
            WorkloadKind::ReplicaSet => "replicaset",
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::Pod => "pod",
            WorkloadKind::Job => "job",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kubectl_name())
    }
}

/// Resource kinds that other workloads can reference and that therefore
/// trigger dependency propagation when they change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    ConfigMap,
    Secret,
}

impl ReferenceKind {
    /// Classify a job name as a propagation trigger.
    pub fn detect(job_name: &str) -> Option<ReferenceKind> {
        let name = job_name.to_ascii_lowercase();
        if name.contains("configmap") {
            Some(ReferenceKind::ConfigMap)
        } else if name.contains("secret") {
            Some(ReferenceKind::Secret)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::ConfigMap => write!(f, "configmap"),
            ReferenceKind::Secret => write!(f, "secret"),
        }
    }
}
