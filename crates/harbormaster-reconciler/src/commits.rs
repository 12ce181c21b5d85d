//! Commit reconciliation: apply manifest repository history to the cluster.
//!
//! With no stored commit this is a first run: the newest commit's full
//! manifest tree is deployed in order. Afterwards each cycle walks the
//! history back to the stored SHA and applies the unapplied commits oldest
//! first, classifying each commit's files before moving the checkout.
//!
//! The stored SHA advances per commit, after classification and checkout
//! but before the deferred deploys run. A crash in between leaves the
//! pointer at-most-once and resource application at-least-once; declarative
//! re-apply absorbs the difference.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use harbormaster_core::action::DeployAction;
use harbormaster_core::document::ManifestDocument;
use harbormaster_core::executor::DeploymentExecutor;
use harbormaster_core::host::{CommitInfo, ManifestHost};
use harbormaster_core::kind::{ReferenceKind, WorkloadKind};
use harbormaster_core::manifest::{sort_records, ChangeRecord, ChangeStatus, ManifestPath};
use harbormaster_core::naming::job_name;
use harbormaster_core::package::COMMIT_KEY;
use harbormaster_core::store::StateStore;
use harbormaster_core::workspace::ManifestWorkspace;
use harbormaster_core::Result;

use crate::propagate::DependencyPropagator;
use crate::resolve::{self, TrackedPackage};

pub struct CommitReconciler {
    store: Arc<dyn StateStore>,
    host: Arc<dyn ManifestHost>,
    workspace: Arc<dyn ManifestWorkspace>,
    executor: Arc<dyn DeploymentExecutor>,
    propagator: DependencyPropagator,
    /// Image name of the controller itself; its manifest is protected
    /// from removal.
    bootstrap_image: String,
}

impl CommitReconciler {
    pub fn new(
        store: Arc<dyn StateStore>,
        host: Arc<dyn ManifestHost>,
        workspace: Arc<dyn ManifestWorkspace>,
        executor: Arc<dyn DeploymentExecutor>,
        bootstrap_image: String,
    ) -> Self {
        let propagator = DependencyPropagator::new(workspace.manifest_root());
        Self {
            store,
            host,
            workspace,
            executor,
            propagator,
            bootstrap_image,
        }
    }

    /// One commit pass.
    pub async fn reconcile(&self) -> Result<()> {
        let commits = self.host.list_commits().await?;
        if commits.is_empty() {
            debug!("Repository has no commits");
            return Ok(());
        }

        match self.store.get(COMMIT_KEY).await?.filter(|s| !s.is_empty()) {
            None => self.first_run(&commits[0].sha).await,
            Some(stored) => self.steady_state(&stored, &commits).await,
        }
    }

    /// Deploy the newest commit's entire manifest tree, then record it.
    async fn first_run(&self, sha: &str) -> Result<()> {
        info!(sha = %sha, "No tracked commit, deploying the full tree");
        self.workspace.checkout(sha).await?;

        let packages = resolve::load_packages(self.store.as_ref()).await?;
        let manifests = resolve::scan_manifests(&self.workspace.manifest_root()).await?;
        for manifest in manifests {
            let action = DeployAction::apply(
                job_name(manifest.path.stem_tail(), sha, &manifest.path.full_path),
                resolve::resolve_image(&packages, manifest.path.file_stem()),
                manifest.absolute.clone(),
            );
            self.issue(&action).await;
        }

        // Only after all files are applied does the pointer exist at all.
        self.store.put(COMMIT_KEY, sha).await
    }

    /// Apply every commit newer than the stored SHA, oldest first.
    async fn steady_state(&self, stored: &str, commits: &[CommitInfo]) -> Result<()> {
        let mut unapplied: Vec<&str> = commits
            .iter()
            .map(|commit| commit.sha.as_str())
            .take_while(|sha| *sha != stored)
            .collect();
        if unapplied.is_empty() {
            debug!(sha = %stored, "Tracked commit is the newest, nothing to apply");
            return Ok(());
        }
        if unapplied.len() == commits.len() {
            // Stored SHA fell out of the listed history (force push or
            // truncated listing). Everything listed counts as unapplied.
            warn!(sha = %stored, "Tracked commit not found in history");
        }

        unapplied.reverse();
        for sha in unapplied {
            self.process_commit(sha).await?;
        }
        Ok(())
    }

    async fn process_commit(&self, sha: &str) -> Result<()> {
        info!(sha = %sha, "Applying commit");
        let detail = self.host.get_commit(sha).await?;

        let mut records = Vec::new();
        for file in &detail.files {
            let Some(status) = ChangeStatus::parse(&file.status) else {
                warn!(file = %file.filename, status = %file.status, "Unknown change status, skipping");
                continue;
            };
            let Some(path) = ManifestPath::parse(&file.filename) else {
                warn!(file = %file.filename, "Path outside the ordering convention, skipping");
                continue;
            };
            records.push(ChangeRecord { path, status });
        }
        sort_records(&mut records);

        // Removals run against the current checkout, whose tree still has
        // the file content kubectl needs. Adds and modifications wait for
        // the new tree.
        let mut deferred = Vec::new();
        for record in records {
            match record.status {
                ChangeStatus::Removed => self.remove(sha, &record.path).await,
                ChangeStatus::Added | ChangeStatus::Modified => deferred.push(record.path),
                other => debug!(file = %record.path, status = %other, "Status needs no action"),
            }
        }

        self.workspace.checkout(sha).await?;
        self.store.put(COMMIT_KEY, sha).await?;

        let packages = resolve::load_packages(self.store.as_ref()).await?;
        for path in deferred {
            self.deploy(sha, &path, &packages).await;
        }
        Ok(())
    }

    async fn remove(&self, sha: &str, path: &ManifestPath) {
        if path.file_stem().contains(&self.bootstrap_image) {
            warn!(file = %path, "Refusing to delete the controller's own manifest");
            return;
        }
        let action = DeployAction::delete(
            job_name(path.stem_tail(), sha, &path.full_path),
            self.workspace.manifest_root().join(&path.full_path),
        );
        self.issue(&action).await;
    }

    async fn deploy(&self, sha: &str, path: &ManifestPath, packages: &[TrackedPackage]) {
        let absolute = self.workspace.manifest_root().join(&path.full_path);
        let image = resolve::resolve_image(packages, path.file_stem());
        let name = job_name(path.stem_tail(), sha, &path.full_path);

        let document = match tokio::fs::read_to_string(&absolute).await {
            Ok(content) => match ManifestDocument::from_str(&content) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(file = %path, error = %e, "Cannot parse manifest");
                    None
                }
            },
            Err(e) => {
                warn!(file = %path, error = %e, "Cannot read manifest");
                None
            }
        };

        // Workloads carry pods and need a clean delete before re-apply;
        // everything else is patched in place by a plain apply.
        let action = match WorkloadKind::detect(&name) {
            Some(_) => {
                let coordinates = document.as_ref().and_then(|doc| {
                    Some((doc.kind.clone()?, doc.name.clone()?, doc.namespace.clone()?))
                });
                match coordinates {
                    Some((kind, resource, namespace)) => DeployAction::redeploy(
                        name, image, absolute, kind, resource, namespace,
                    ),
                    None => {
                        warn!(file = %path, "Workload lacks full coordinates, applying without delete");
                        DeployAction::apply(name, image, absolute)
                    }
                }
            }
            None => DeployAction::apply(name, image, absolute),
        };
        self.issue(&action).await;

        if let Some(reference) = ReferenceKind::detect(&action.job_name) {
            if let Some(document) = document {
                self.propagate(&document, reference, sha, packages).await;
            }
        }
    }

    async fn propagate(
        &self,
        document: &ManifestDocument,
        reference: ReferenceKind,
        sha: &str,
        packages: &[TrackedPackage],
    ) {
        match self
            .propagator
            .propagate(document, reference, sha, packages)
            .await
        {
            Ok(actions) => {
                for action in actions {
                    info!(
                        job = %action.job_name,
                        trigger = %reference,
                        "Redeploying dependent resource"
                    );
                    self.issue(&action).await;
                }
            }
            Err(e) => warn!(kind = %reference, error = %e, "Dependency scan failed"),
        }
    }

    /// Execution failures are logged and do not abort the pass.
    async fn issue(&self, action: &DeployAction) {
        if let Err(e) = self.executor.execute(action).await {
            error!(job = %action.job_name, error = %e, "Deploy action failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manifest_tree, FixedWorkspace, MockHost, RecordingExecutor};
    use harbormaster_core::action::DeployVerb;
    use harbormaster_core::package::StoredPackage;
    use harbormaster_store::MemoryStore;
    use tempfile::TempDir;

    const SERVICE: &str = "\
kind: Service
metadata:
  name: app
  namespace: prod
";

    const DEPLOYMENT: &str = "\
kind: Deployment
metadata:
  name: app
  namespace: prod
";

    const CONFIG_MAP: &str = "\
kind: ConfigMap
metadata:
  name: cfg-a
  namespace: prod
";

    const CONSUMER: &str = "\
kind: Deployment
metadata:
  name: app
  namespace: prod
spec:
  template:
    spec:
      volumes:
        - name: config
          configMap:
            name: cfg-a
";

    struct Harness {
        reconciler: CommitReconciler,
        store: Arc<MemoryStore>,
        executor: Arc<RecordingExecutor>,
        workspace: Arc<FixedWorkspace>,
        _tree: TempDir,
    }

    fn harness(tree: TempDir, host: MockHost, store: MemoryStore) -> Harness {
        let store = Arc::new(store);
        let executor = Arc::new(RecordingExecutor::default());
        let workspace = Arc::new(FixedWorkspace::new(tree.path()));
        let reconciler = CommitReconciler::new(
            store.clone(),
            Arc::new(host),
            workspace.clone(),
            executor.clone(),
            "harbormaster".to_string(),
        );
        Harness {
            reconciler,
            store,
            executor,
            workspace,
            _tree: tree,
        }
    }

    fn executed_files(executor: &RecordingExecutor) -> Vec<String> {
        executor
            .actions()
            .iter()
            .map(|a| {
                let path = a.manifest_path.to_string_lossy().into_owned();
                let mut parts = path.rsplit('/');
                let file = parts.next().unwrap_or_default();
                let folder = parts.next().unwrap_or_default();
                format!("{folder}/{file}")
            })
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_deploys_full_tree_in_order() {
        let tree = manifest_tree(&[
            ("2-app/1-app-deployment.yml", DEPLOYMENT),
            ("1-net/1-app-service.yml", SERVICE),
        ]);
        let host = MockHost::with_commit("c1", &[]);
        let h = harness(tree, host, MemoryStore::new());

        h.reconciler.reconcile().await.unwrap();

        assert_eq!(
            executed_files(&h.executor),
            vec!["1-net/1-app-service.yml", "2-app/1-app-deployment.yml"]
        );
        // First run applies plainly, with the sentinel image.
        for action in h.executor.actions() {
            assert_eq!(action.verb, DeployVerb::Apply);
            assert!(!action.delete_before_apply);
            assert_eq!(action.image_url, "default");
        }
        assert_eq!(
            h.store.get(COMMIT_KEY).await.unwrap().as_deref(),
            Some("c1")
        );
        assert_eq!(h.workspace.checkouts.lock().unwrap().as_slice(), ["c1"]);
    }

    #[tokio::test]
    async fn test_steady_state_noop_when_up_to_date() {
        let tree = manifest_tree(&[("1-net/1-app-service.yml", SERVICE)]);
        let host = MockHost::with_commit("c1", &[("1-net/1-app-service.yml", "added")]);
        let store =
            MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        assert!(h.executor.actions().is_empty());
        assert!(h.workspace.checkouts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changed_files_deploy_in_folder_file_order() {
        let tree = manifest_tree(&[
            ("1-net/1-cm.yml", CONFIG_MAP),
            ("1-net/2-svc.yml", SERVICE),
            ("2-app/1-deploy.yml", DEPLOYMENT),
        ]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest(
            "c2",
            &[
                ("2-app/1-deploy.yml", "added"),
                ("1-net/2-svc.yml", "added"),
                ("1-net/1-cm.yml", "added"),
            ],
        );
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        assert_eq!(
            executed_files(&h.executor),
            vec!["1-net/1-cm.yml", "1-net/2-svc.yml", "2-app/1-deploy.yml"]
        );
        assert_eq!(
            h.store.get(COMMIT_KEY).await.unwrap().as_deref(),
            Some("c2")
        );
    }

    #[tokio::test]
    async fn test_workload_changes_delete_then_apply() {
        let tree = manifest_tree(&[
            ("1-net/1-app-service.yml", SERVICE),
            ("2-app/1-app-deployment.yml", DEPLOYMENT),
        ]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest(
            "c2",
            &[
                ("1-net/1-app-service.yml", "modified"),
                ("2-app/1-app-deployment.yml", "modified"),
            ],
        );
        let store = MemoryStore::with_entries([
            (COMMIT_KEY.to_string(), "c1".to_string()),
            (
                "package:app".to_string(),
                StoredPackage {
                    id: 7,
                    image_url: "ghcr.io/acme/acme-app:main@sha256:v2".to_string(),
                }
                .to_json(),
            ),
        ]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        let actions = h.executor.actions();
        assert_eq!(actions.len(), 2);
        // The service is a plain apply.
        assert!(!actions[0].delete_before_apply);
        // The deployment is a workload: delete-then-apply with coordinates
        // from the manifest and the tracked image.
        assert!(actions[1].delete_before_apply);
        assert_eq!(actions[1].kind.as_deref(), Some("Deployment"));
        assert_eq!(actions[1].name.as_deref(), Some("app"));
        assert_eq!(actions[1].namespace.as_deref(), Some("prod"));
        assert_eq!(
            actions[1].image_url,
            "ghcr.io/acme/acme-app:main@sha256:v2"
        );
    }

    #[tokio::test]
    async fn test_removed_file_is_deleted_except_bootstrap() {
        let tree = manifest_tree(&[("1-net/1-app-service.yml", SERVICE)]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest(
            "c2",
            &[
                ("1-net/1-app-service.yml", "removed"),
                ("0-boot/1-harbormaster-deployment.yml", "removed"),
            ],
        );
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        let actions = h.executor.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].verb, DeployVerb::Delete);
        assert!(actions[0]
            .manifest_path
            .to_string_lossy()
            .ends_with("1-net/1-app-service.yml"));
    }

    #[tokio::test]
    async fn test_malformed_paths_do_not_abort_the_batch() {
        let tree = manifest_tree(&[("1-net/1-app-service.yml", SERVICE)]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest(
            "c2",
            &[
                ("README.md", "modified"),
                ("net/app-service.yml", "added"),
                ("1-net/1-app-service.yml", "added"),
            ],
        );
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();
        assert_eq!(h.executor.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_unapplied_commits_run_oldest_first() {
        let tree = manifest_tree(&[
            ("1-net/1-app-service.yml", SERVICE),
            ("2-app/1-app-deployment.yml", DEPLOYMENT),
        ]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest("c2", &[("1-net/1-app-service.yml", "added")]);
        host.push_newest("c3", &[("2-app/1-app-deployment.yml", "added")]);
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        assert_eq!(
            h.workspace.checkouts.lock().unwrap().as_slice(),
            ["c2", "c3"]
        );
        assert_eq!(
            executed_files(&h.executor),
            vec!["1-net/1-app-service.yml", "2-app/1-app-deployment.yml"]
        );
        assert_eq!(
            h.store.get(COMMIT_KEY).await.unwrap().as_deref(),
            Some("c3")
        );
    }

    #[tokio::test]
    async fn test_changed_configmap_propagates_to_consumer() {
        let tree = manifest_tree(&[
            ("1-net/1-app-configmap.yml", CONFIG_MAP),
            ("2-app/1-app-deployment.yml", CONSUMER),
        ]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest("c2", &[("1-net/1-app-configmap.yml", "modified")]);
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        let actions = h.executor.actions();
        // The ConfigMap apply, then the consumer redeploy.
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].verb, DeployVerb::Apply);
        assert!(!actions[0].delete_before_apply);
        assert!(actions[1].delete_before_apply);
        assert_eq!(actions[1].kind.as_deref(), Some("Deployment"));
        assert_eq!(actions[1].name.as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn test_job_names_stay_unique_when_configmap_and_consumer_change_together() {
        let tree = manifest_tree(&[
            ("1-net/1-app-configmap.yml", CONFIG_MAP),
            ("2-app/1-app-deployment.yml", CONSUMER),
        ]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest(
            "c2",
            &[
                ("1-net/1-app-configmap.yml", "modified"),
                ("2-app/1-app-deployment.yml", "modified"),
            ],
        );
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        // ConfigMap apply, propagation redeploy of the consumer, and the
        // consumer's own deploy: three jobs, no shared name.
        let names: Vec<String> = h
            .executor
            .actions()
            .iter()
            .map(|a| a.job_name.clone())
            .collect();
        assert_eq!(names.len(), 3);
        let unique: std::collections::BTreeSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[tokio::test]
    async fn test_stored_commit_missing_from_history_reapplies_everything() {
        let tree = manifest_tree(&[("1-net/1-app-service.yml", SERVICE)]);
        let host = MockHost::with_commit("c5", &[("1-net/1-app-service.yml", "added")]);
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "ghost".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();

        assert_eq!(h.executor.actions().len(), 1);
        assert_eq!(
            h.store.get(COMMIT_KEY).await.unwrap().as_deref(),
            Some("c5")
        );
    }

    #[tokio::test]
    async fn test_changed_status_counts_as_modified() {
        let tree = manifest_tree(&[("1-net/1-app-service.yml", SERVICE)]);
        let mut host = MockHost::with_commit("c1", &[]);
        host.push_newest("c2", &[("1-net/1-app-service.yml", "changed")]);
        let store = MemoryStore::with_entries([(COMMIT_KEY.to_string(), "c1".to_string())]);
        let h = harness(tree, host, store);

        h.reconciler.reconcile().await.unwrap();
        assert_eq!(h.executor.actions().len(), 1);
    }
}
