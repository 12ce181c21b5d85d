//! Version reconciliation: registry listing vs stored package state.
//!
//! A package is a candidate when its registry name carries the configured
//! prefix, or when it is the controller's own image (self-update). New
//! packages are persisted but not deployed; deployment happens once a
//! manifest change references the image. A changed version redeploys the
//! manifest carrying the `app: <name>` marker with the new image.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use harbormaster_core::action::DeployAction;
use harbormaster_core::document::ManifestDocument;
use harbormaster_core::executor::DeploymentExecutor;
use harbormaster_core::naming::job_name;
use harbormaster_core::package::{image_url, package_key, StoredPackage};
use harbormaster_core::registry::PackageRegistry;
use harbormaster_core::store::StateStore;
use harbormaster_core::workspace::ManifestWorkspace;
use harbormaster_core::Result;

use crate::resolve::{self, ManifestFile, TrackedPackage};

/// Identity knobs for the version pass.
#[derive(Debug, Clone)]
pub struct VersionOptions {
    pub account: String,
    pub registry_host: String,
    /// Prefix identifying packages managed by this cluster. A package
    /// `<prefix>-<rest>` is tracked under the name `<rest>`.
    pub custom_prefix: String,
    /// The controller's own image, tracked without the prefix.
    pub bootstrap_image: String,
}

/// A registry package that passed the name filter.
struct Candidate {
    /// Name used for state-store keys and manifest matching.
    tracked_name: String,
    /// Full registry-side name, used for version listing and image URLs.
    registry_name: String,
    id: i64,
}

pub struct VersionReconciler {
    store: Arc<dyn StateStore>,
    registry: Arc<dyn PackageRegistry>,
    executor: Arc<dyn DeploymentExecutor>,
    workspace: Arc<dyn ManifestWorkspace>,
    options: VersionOptions,
}

impl VersionReconciler {
    pub fn new(
        store: Arc<dyn StateStore>,
        registry: Arc<dyn PackageRegistry>,
        executor: Arc<dyn DeploymentExecutor>,
        workspace: Arc<dyn ManifestWorkspace>,
        options: VersionOptions,
    ) -> Self {
        Self {
            store,
            registry,
            executor,
            workspace,
            options,
        }
    }

    /// One version pass. Actions are issued before returning; the return
    /// value exists for observability and tests.
    ///
    /// A registry listing failure aborts the whole pass so no partially
    /// observed state gets persisted. Failures scoped to one package are
    /// logged and skip that package only.
    pub async fn reconcile(&self) -> Result<Vec<DeployAction>> {
        let stored = resolve::load_packages(self.store.as_ref()).await?;
        let listed = self.registry.list_packages().await?;

        let candidates: Vec<Candidate> = listed
            .iter()
            .filter_map(|package| self.classify(&package.name, package.id))
            .collect();

        let mut actions = Vec::new();
        for candidate in &candidates {
            if let Some(action) = self.reconcile_package(candidate, &stored).await {
                actions.push(action);
            }
        }

        self.clean_tombstones(&stored, &candidates).await;
        Ok(actions)
    }

    fn classify(&self, registry_name: &str, id: i64) -> Option<Candidate> {
        let tracked_name = if registry_name == self.options.bootstrap_image {
            registry_name.to_string()
        } else {
            registry_name
                .strip_prefix(&format!("{}-", self.options.custom_prefix))?
                .to_string()
        };
        Some(Candidate {
            tracked_name,
            registry_name: registry_name.to_string(),
            id,
        })
    }

    /// Reconcile one candidate; returns the action issued, if any.
    async fn reconcile_package(
        &self,
        candidate: &Candidate,
        stored: &[TrackedPackage],
    ) -> Option<DeployAction> {
        let versions = match self.registry.list_versions(&candidate.registry_name).await {
            Ok(versions) => versions,
            Err(error) => {
                warn!(package = %candidate.tracked_name, %error, "Version listing failed, skipping");
                return None;
            }
        };
        let Some(latest) = versions.iter().find(|v| !v.name.is_empty()) else {
            warn!(package = %candidate.tracked_name, "No published version, skipping");
            return None;
        };

        let new_image = image_url(
            &self.options.registry_host,
            &self.options.account,
            &candidate.registry_name,
            &latest.name,
        );
        let record = StoredPackage {
            id: candidate.id,
            image_url: new_image.clone(),
        };

        let previous = stored
            .iter()
            .find(|package| package.name == candidate.tracked_name);
        match previous {
            None => {
                // First discovery: remember it, deploy nothing. The deploy
                // comes with the manifest change that references the image.
                if let Err(error) = self.persist(&candidate.tracked_name, &record).await {
                    warn!(package = %candidate.tracked_name, %error, "Cannot persist new package");
                    return None;
                }
                info!(package = %candidate.tracked_name, image = %new_image, "Tracking new package");
                None
            }
            Some(previous)
                if previous.stored.id == candidate.id
                    && previous.stored.image_url == new_image =>
            {
                debug!(package = %candidate.tracked_name, "Package unchanged");
                None
            }
            Some(_) => {
                if let Err(error) = self.persist(&candidate.tracked_name, &record).await {
                    warn!(package = %candidate.tracked_name, %error, "Cannot persist package update");
                    return None;
                }
                info!(package = %candidate.tracked_name, image = %new_image, "Package version moved");
                self.redeploy(&candidate.tracked_name, &new_image).await
            }
        }
    }

    async fn persist(&self, name: &str, record: &StoredPackage) -> Result<()> {
        self.store.put(&package_key(name), &record.to_json()).await
    }

    /// Redeploy the manifest carrying `app: <name>` with the new image.
    async fn redeploy(&self, name: &str, new_image: &str) -> Option<DeployAction> {
        let root = self.workspace.manifest_root();
        let manifest = match resolve::find_manifest_for_app(&root, name).await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                warn!(package = %name, "No manifest references the package, skipping deploy");
                return None;
            }
            Err(error) => {
                warn!(package = %name, %error, "Manifest search failed, skipping deploy");
                return None;
            }
        };

        let action = build_update_action(&manifest, new_image).await;
        if let Err(error) = self.executor.execute(&action).await {
            error!(job = %action.job_name, %error, "Deploy failed");
        }
        Some(action)
    }

    /// Drop stored packages the registry no longer lists. No cluster-side
    /// deletion happens here; retiring the workload is an operator action.
    async fn clean_tombstones(&self, stored: &[TrackedPackage], candidates: &[Candidate]) {
        for package in stored {
            if candidates.iter().any(|c| c.tracked_name == package.name) {
                continue;
            }
            match self.store.delete(&package_key(&package.name)).await {
                Ok(()) => info!(package = %package.name, "Dropped unlisted package"),
                Err(error) => {
                    warn!(package = %package.name, %error, "Cannot drop unlisted package")
                }
            }
        }
    }
}

/// Build the action for a version-driven update: delete-then-apply when
/// the manifest yields live coordinates, plain apply otherwise. The job
/// name is discriminated by the new image URL.
async fn build_update_action(manifest: &ManifestFile, new_image: &str) -> DeployAction {
    let name = job_name(
        manifest.path.stem_tail(),
        new_image,
        &manifest.path.full_path,
    );
    let coordinates = match tokio::fs::read_to_string(&manifest.absolute).await {
        Ok(content) => ManifestDocument::from_str(&content)
            .ok()
            .and_then(|doc| Some((doc.kind?, doc.name?, doc.namespace?))),
        Err(_) => None,
    };

    match coordinates {
        Some((kind, resource, namespace)) => DeployAction::redeploy(
            name,
            new_image.to_string(),
            manifest.absolute.clone(),
            kind,
            resource,
            namespace,
        ),
        None => {
            warn!(file = %manifest.path, "Manifest has no full coordinates, applying without delete");
            DeployAction::apply(name, new_image.to_string(), manifest.absolute.clone())
        }
    }
}
