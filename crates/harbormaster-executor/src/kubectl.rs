//! Kubernetes Job executor running kubectl shell pipelines.
//!
//! Every deploy action becomes one batch/v1 Job running `bitnami/kubectl`.
//! The job pipes the manifest through sed, substituting the two markers
//! the manifest repository uses (`image_url_var` for the container image,
//! `pull_ghcr_image_token` for the registry pull token), then applies or
//! deletes it. Delete-then-apply additionally deletes the live resource by
//! kind and name before re-applying.
//!
//! The agent and the job mount the same PVC at the same path, so the
//! absolute manifest path in the action is valid inside the job container.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaimVolumeSource, Pod, PodSpec, PodTemplateSpec, Volume,
    VolumeMount,
};
use kube::api::{Api, ListParams, ObjectMeta, PostParams};
use kube::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use harbormaster_core::action::{DeployAction, DeployVerb};
use harbormaster_core::document::ManifestDocument;
use harbormaster_core::executor::{DeploymentExecutor, Stability};
use harbormaster_core::{Error, Result};

const KUBECTL_IMAGE: &str = "bitnami/kubectl:latest";
const JOB_BACKOFF_LIMIT: i32 = 2;
/// Finished runner Jobs are garbage-collected so their names can be
/// reused by later passes.
const JOB_TTL_SECONDS: i32 = 300;
const MANIFEST_VOLUME: &str = "manifests";

/// Poll budget for the pod-stability wait.
pub const MAX_STABILITY_CHECKS: u32 = 50;
pub const STABILITY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Cluster-side parameters for runner jobs.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Namespace runner jobs are created in.
    pub namespace: String,
    /// PVC holding the manifest checkout.
    pub pvc_claim: String,
    /// Service account the runner jobs use.
    pub service_account: String,
    /// Mount point of the PVC, in the agent and in the job alike.
    pub mount_path: PathBuf,
    /// Registry pull token substituted into manifests.
    pub image_pull_token: String,
}

/// Deployment executor backed by kubectl runner Jobs.
pub struct KubectlJobExecutor {
    /// Kept whole: runner Jobs live in the controller's namespace, but
    /// pod waits list whichever namespace the deployed resource is in.
    client: Client,
    jobs: Api<Job>,
    settings: RunnerSettings,
}

impl KubectlJobExecutor {
    pub fn new(client: Client, settings: RunnerSettings) -> Self {
        Self {
            jobs: Api::namespaced(client.clone(), &settings.namespace),
            client,
            settings,
        }
    }
}

/// Build the shell pipeline for one action.
fn build_script(action: &DeployAction, image_pull_token: &str) -> String {
    let manifest = action.manifest_path.display();
    let substitute = format!(
        "cat {manifest} | sed \"s#pull_ghcr_image_token#{image_pull_token}#g\" | sed \"s#image_url_var#{image}#g\"",
        image = action.image_url,
    );

    match (&action.verb, action.delete_before_apply) {
        (DeployVerb::Apply, true) => {
            // Coordinates are guaranteed by DeployAction::redeploy.
            let kind = action.kind.as_deref().unwrap_or_default().to_lowercase();
            let name = action.name.as_deref().unwrap_or_default();
            let namespace = action.namespace.as_deref().unwrap_or_default();
            format!(
                "{substitute} | {{ kubectl delete {kind} {name} -n {namespace}; kubectl apply -f -; }}"
            )
        }
        (verb, _) => format!("{substitute} | kubectl {verb} -f -"),
    }
}

/// Build the runner Job object for one action.
fn build_job(action: &DeployAction, settings: &RunnerSettings) -> Job {
    let script = build_script(action, &settings.image_pull_token);
    Job {
        metadata: ObjectMeta {
            name: Some(action.job_name.clone()),
            namespace: Some(settings.namespace.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(JOB_BACKOFF_LIMIT),
            ttl_seconds_after_finished: Some(JOB_TTL_SECONDS),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    service_account_name: Some(settings.service_account.clone()),
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: "script".to_string(),
                        image: Some(KUBECTL_IMAGE.to_string()),
                        command: Some(vec![
                            "/bin/bash".to_string(),
                            "-c".to_string(),
                            script,
                        ]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: MANIFEST_VOLUME.to_string(),
                            mount_path: settings.mount_path.display().to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: MANIFEST_VOLUME.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: settings.pvc_claim.clone(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Read the resource name/namespace out of the manifest, tolerantly.
async fn resource_coordinates(path: &Path) -> Option<(String, String)> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let document = ManifestDocument::from_str(&content).ok()?;
    Some((document.name?, document.namespace?))
}

/// True when any pod whose name contains `name_hint` is still transient.
/// The list must already be scoped to the resource's namespace.
fn any_transient(pods: &[Pod], name_hint: &str) -> bool {
    pods.iter().any(|pod| {
        pod.metadata
            .name
            .as_deref()
            .is_some_and(|name| name.contains(name_hint))
            && is_transient(pod)
    })
}

/// True when the pod is pending or one of its containers is still being
/// created. `Pending` is a pod phase; `ContainerCreating` only ever shows
/// up as a container waiting reason.
fn is_transient(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return true;
    };
    if status.phase.as_deref() == Some("Pending") {
        return true;
    }
    status
        .container_statuses
        .iter()
        .flatten()
        .any(|container| {
            container
                .state
                .as_ref()
                .and_then(|state| state.waiting.as_ref())
                .and_then(|waiting| waiting.reason.as_deref())
                == Some("ContainerCreating")
        })
}

#[async_trait]
impl DeploymentExecutor for KubectlJobExecutor {
    async fn execute(&self, action: &DeployAction) -> Result<()> {
        let job = build_job(action, &self.settings);
        info!(
            job = %action.job_name,
            manifest = %action.manifest_path.display(),
            verb = %action.verb,
            redeploy = action.delete_before_apply,
            "Spawning runner job"
        );
        self.jobs
            .create(&PostParams::default(), &job)
            .await
            .map_err(|e| Error::ExecutionFailed(e.to_string()))?;

        // Block until the affected resource's pods settle. The manifest is
        // the source of truth for the live coordinates; files that cannot
        // be read (deleted, multi-document) skip the wait.
        if let Some((name, namespace)) = resource_coordinates(&action.manifest_path).await {
            match self
                .wait_until_stable(
                    &name,
                    &namespace,
                    MAX_STABILITY_CHECKS,
                    STABILITY_POLL_INTERVAL,
                )
                .await?
            {
                Stability::Stable => debug!(resource = %name, "Pods stable"),
                Stability::Unstable => {
                    warn!(resource = %name, "Pods still transient after poll budget, moving on")
                }
            }
        }
        Ok(())
    }

    async fn wait_until_stable(
        &self,
        name_hint: &str,
        namespace: &str,
        max_checks: u32,
        interval: Duration,
    ) -> Result<Stability> {
        // The resource's pods live in its own namespace, which is rarely
        // the controller's.
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        for _ in 0..max_checks {
            let listed = pods
                .list(&ListParams::default())
                .await
                .map_err(|e| Error::ExecutionFailed(e.to_string()))?;

            if !any_transient(&listed.items, name_hint) {
                return Ok(Stability::Stable);
            }
            debug!(resource = %name_hint, "Pod still transient, polling again");
            sleep(interval).await;
        }
        Ok(Stability::Unstable)
    }
}
