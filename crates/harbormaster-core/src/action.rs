//! Deploy actions: a single intended mutation against one cluster resource.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kubectl verb to run against the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployVerb {
    Apply,
    Delete,
}

impl std::fmt::Display for DeployVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployVerb::Apply => write!(f, "apply"),
            DeployVerb::Delete => write!(f, "delete"),
        }
    }
}

/// One intended mutation against one cluster resource.
///
/// Consumed immediately by the deployment executor; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployAction {
    /// Deterministic name for the executor job that carries this action.
    pub job_name: String,
    /// Image reference substituted into the manifest, or `"default"` to
    /// keep whatever image the manifest already specifies.
    pub image_url: String,
    /// Absolute path of the manifest file in the shared working tree.
    pub manifest_path: PathBuf,
    pub verb: DeployVerb,
    /// Delete the live resource before re-applying the manifest. Requires
    /// `kind`, `name` and `namespace` to be set.
    pub delete_before_apply: bool,
    /// Live resource coordinates, read from the manifest when the action
    /// needs to address the resource directly (delete-then-apply).
    pub kind: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
}

impl DeployAction {
    /// A plain apply, leaving the live resource in place.
    pub fn apply(job_name: String, image_url: String, manifest_path: PathBuf) -> Self {
        Self {
            job_name,
            image_url,
            manifest_path,
            verb: DeployVerb::Apply,
            delete_before_apply: false,
            kind: None,
            name: None,
            namespace: None,
        }
    }

    /// A delete of whatever the manifest describes. No image is needed:
    /// deletion works on kind and name alone.
    pub fn delete(job_name: String, manifest_path: PathBuf) -> Self {
        Self {
            job_name,
            image_url: "not_needed".to_string(),
            manifest_path,
            verb: DeployVerb::Delete,
            delete_before_apply: false,
            kind: None,
            name: None,
            namespace: None,
        }
    }

    /// A delete of the live resource followed by a fresh apply.
    pub fn redeploy(
        job_name: String,
        image_url: String,
        manifest_path: PathBuf,
        kind: String,
        name: String,
        namespace: String,
    ) -> Self {
        Self {
            job_name,
            image_url,
            manifest_path,
            verb: DeployVerb::Apply,
            delete_before_apply: true,
            kind: Some(kind),
            name: Some(name),
            namespace: Some(namespace),
        }
    }
}
