//! Dependency propagation: redeploy consumers of a changed ConfigMap or
//! Secret.
//!
//! Consumers are found by scanning every manifest in the monitored tree
//! for volume references (`configMap.name`, `secret.secretName`) and, for
//! secrets, `imagePullSecrets[].name` inside pod-template specs. Matching
//! is exact string equality on the changed resource's `metadata.name`.

use std::path::PathBuf;
use tracing::warn;

use harbormaster_core::action::DeployAction;
use harbormaster_core::document::ManifestDocument;
use harbormaster_core::kind::ReferenceKind;
use harbormaster_core::naming::job_name;
use harbormaster_core::Result;

use crate::resolve::{self, TrackedPackage};

pub struct DependencyPropagator {
    /// Absolute path of the monitored folder.
    root: PathBuf,
}

impl DependencyPropagator {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Actions redeploying every consumer of the changed resource. The
    /// state store is never touched; the caller executes the actions
    /// within the same commit-processing step.
    pub async fn propagate(
        &self,
        changed: &ManifestDocument,
        kind: ReferenceKind,
        discriminator: &str,
        packages: &[TrackedPackage],
    ) -> Result<Vec<DeployAction>> {
        let Some(changed_name) = changed.name.as_deref() else {
            warn!("Changed resource has no metadata.name, cannot propagate");
            return Ok(Vec::new());
        };

        // A consumer may change in the same commit as the resource it
        // mounts; tagging the discriminator with the trigger keeps this
        // redeploy's job name distinct from the consumer's own deploy,
        // and from propagations of other changed resources.
        let discriminator = format!("{kind}:{changed_name}:{discriminator}");

        let mut actions = Vec::new();
        for manifest in resolve::scan_manifests(&self.root).await? {
            let content = match tokio::fs::read_to_string(&manifest.absolute).await {
                Ok(content) => content,
                Err(error) => {
                    warn!(file = %manifest.path, %error, "Cannot read manifest, skipping");
                    continue;
                }
            };
            let consumer = match ManifestDocument::from_str(&content) {
                Ok(consumer) => consumer,
                Err(error) => {
                    warn!(file = %manifest.path, %error, "Cannot parse manifest, skipping");
                    continue;
                }
            };

            if !references(&consumer, kind, changed_name) {
                continue;
            }
            let (Some(consumer_kind), Some(name), Some(namespace)) =
                (consumer.kind, consumer.name, consumer.namespace)
            else {
                warn!(file = %manifest.path, "Consumer lacks full coordinates, skipping redeploy");
                continue;
            };

            actions.push(DeployAction::redeploy(
                job_name(
                    manifest.path.stem_tail(),
                    &discriminator,
                    &manifest.path.full_path,
                ),
                resolve::resolve_image(packages, manifest.path.file_stem()),
                manifest.absolute.clone(),
                consumer_kind,
                name,
                namespace,
            ));
        }
        Ok(actions)
    }
}

fn references(consumer: &ManifestDocument, kind: ReferenceKind, name: &str) -> bool {
    match kind {
        ReferenceKind::ConfigMap => consumer.config_map_refs().contains(&name),
        ReferenceKind::Secret => {
            consumer.secret_refs().contains(&name)
                || consumer.image_pull_secret_refs().contains(&name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::manifest_tree;

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
      imagePullSecrets:
        - name: ghcr-pull
      volumes:
        - name: config
          configMap:
            name: cfg-a
        - name: creds
          secret:
            secretName: db-creds
";

    const BYSTANDER: &str = "\
kind: Deployment
metadata:
  name: other
  namespace: prod
spec:
  template:
    spec:
      volumes:
        - name: config
          configMap:
            name: cfg-b
";

    #[tokio::test]
    async fn test_configmap_change_redeploys_consumer() {
        let tree = manifest_tree(&[
            ("1-net/1-app-configmap.yml", CONFIG_MAP),
            ("2-app/1-app-deployment.yml", CONSUMER),
            ("2-app/2-other-deployment.yml", BYSTANDER),
        ]);
        let propagator = DependencyPropagator::new(tree.path().to_path_buf());
        let changed = ManifestDocument::from_str(CONFIG_MAP).unwrap();

        let actions = propagator
            .propagate(&changed, ReferenceKind::ConfigMap, "sha-1", &[])
            .await
            .unwrap();

        // The consumer is targeted, not the ConfigMap itself.
        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert!(action.delete_before_apply);
        assert_eq!(action.kind.as_deref(), Some("Deployment"));
        assert_eq!(action.name.as_deref(), Some("app"));
        assert_eq!(action.namespace.as_deref(), Some("prod"));
    }

    #[tokio::test]
    async fn test_secret_change_matches_volumes_and_pull_secrets() {
        let tree = manifest_tree(&[("2-app/1-app-deployment.yml", CONSUMER)]);
        let propagator = DependencyPropagator::new(tree.path().to_path_buf());

        let db_creds =
            ManifestDocument::from_str("kind: Secret\nmetadata:\n  name: db-creds\n").unwrap();
        let actions = propagator
            .propagate(&db_creds, ReferenceKind::Secret, "sha-1", &[])
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);

        let pull =
            ManifestDocument::from_str("kind: Secret\nmetadata:\n  name: ghcr-pull\n").unwrap();
        let actions = propagator
            .propagate(&pull, ReferenceKind::Secret, "sha-1", &[])
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[tokio::test]
    async fn test_propagation_job_name_differs_from_direct_deploy() {
        let tree = manifest_tree(&[("2-app/1-app-deployment.yml", CONSUMER)]);
        let propagator = DependencyPropagator::new(tree.path().to_path_buf());
        let changed = ManifestDocument::from_str(CONFIG_MAP).unwrap();

        let actions = propagator
            .propagate(&changed, ReferenceKind::ConfigMap, "sha-1", &[])
            .await
            .unwrap();

        // The consumer's own deploy in the same commit uses the bare SHA;
        // the propagation redeploy must not reuse that job name.
        let direct = job_name("deployment", "sha-1", "2-app/1-app-deployment.yml");
        assert_eq!(actions.len(), 1);
        assert_ne!(actions[0].job_name, direct);
    }

    #[tokio::test]
    async fn test_no_consumers_yields_no_actions() {
        let tree = manifest_tree(&[("2-app/2-other-deployment.yml", BYSTANDER)]);
        let propagator = DependencyPropagator::new(tree.path().to_path_buf());
        let changed = ManifestDocument::from_str(CONFIG_MAP).unwrap();

        let actions = propagator
            .propagate(&changed, ReferenceKind::ConfigMap, "sha-1", &[])
            .await
            .unwrap();
        assert!(actions.is_empty());
    }
}
