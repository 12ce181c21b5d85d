//! Controller settings, read from the environment once at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Access tokens for the external services. Three distinct GitHub tokens
/// (registry listing, commit listing, repository cloning) plus the
/// image-pull token the executor substitutes into manifests. Kept out of
/// Debug output.
#[derive(Clone)]
pub struct AccessTokens {
    pub registry: String,
    pub commits: String,
    pub clone: String,
    pub image_pull: String,
}

impl std::fmt::Debug for AccessTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokens")
            .field("registry", &"[REDACTED]")
            .field("commits", &"[REDACTED]")
            .field("clone", &"[REDACTED]")
            .field("image_pull", &"[REDACTED]")
            .finish()
    }
}

/// All controller configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// GitHub account owning the packages and the manifest repository.
    pub account: String,
    /// Manifest repository name.
    pub repo_name: String,
    /// Folder inside the repository that holds the ordered manifests.
    pub folder_name: String,
    /// Prefix identifying container packages managed by this cluster.
    pub custom_prefix: String,
    /// Image name of the controller itself; its manifest must never be
    /// deleted, and its package is tracked without the custom prefix.
    pub bootstrap_image: String,
    /// Namespace the controller operates in (state store, executor jobs).
    pub namespace: String,
    /// Name of the ConfigMap backing the state store.
    pub state_configmap: String,
    /// Container registry host.
    pub registry_host: String,
    /// Mount point of the shared volume holding the repository checkout.
    /// The same volume is mounted at the same path inside executor jobs.
    pub work_dir: PathBuf,
    /// PersistentVolumeClaim backing `work_dir`.
    pub pvc_claim: String,
    /// Service account for executor jobs.
    pub service_account: String,
    /// Sleep between reconciliation cycles.
    pub interval: Duration,
    pub tokens: AccessTokens,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> ConfigResult<Settings> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through a lookup function. Lets tests supply
    /// environments without mutating process state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Settings> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };
        let optional =
            |name: &'static str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let interval_secs = optional("HARBORMASTER_INTERVAL_SECS", "20");
        let interval_secs: u64 =
            interval_secs
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "HARBORMASTER_INTERVAL_SECS",
                    message: format!("not a number: {interval_secs}"),
                })?;

        Ok(Settings {
            account: required("HARBORMASTER_ACCOUNT")?,
            repo_name: required("HARBORMASTER_REPO")?,
            folder_name: required("HARBORMASTER_FOLDER")?,
            custom_prefix: required("HARBORMASTER_IMAGE_PREFIX")?,
            bootstrap_image: optional("HARBORMASTER_BOOTSTRAP_IMAGE", "harbormaster"),
            namespace: optional("HARBORMASTER_NAMESPACE", "admin"),
            state_configmap: optional("HARBORMASTER_STATE_CONFIGMAP", "harbormaster-state"),
            registry_host: optional("HARBORMASTER_REGISTRY_HOST", "ghcr.io"),
            work_dir: PathBuf::from(optional("HARBORMASTER_WORK_DIR", "/yamlstore")),
            pvc_claim: optional("HARBORMASTER_PVC_CLAIM", "yamlstore"),
            service_account: optional("HARBORMASTER_SERVICE_ACCOUNT", "admin-sa"),
            interval: Duration::from_secs(interval_secs),
            tokens: AccessTokens {
                registry: required("HARBORMASTER_REGISTRY_TOKEN")?,
                commits: required("HARBORMASTER_COMMITS_TOKEN")?,
                clone: required("HARBORMASTER_CLONE_TOKEN")?,
                image_pull: required("HARBORMASTER_PULL_TOKEN")?,
            },
        })
    }

    /// Local path of the repository checkout.
    pub fn repo_dir(&self) -> PathBuf {
        self.work_dir.join(&self.repo_name)
    }

    /// Local path of the monitored manifest folder.
    pub fn manifest_root(&self) -> PathBuf {
        self.repo_dir().join(&self.folder_name)
    }
}
