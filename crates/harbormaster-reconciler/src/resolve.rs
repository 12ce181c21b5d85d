//! Manifest tree scanning and image resolution.
//!
//! Both reconcilers need the same two lookups over the checked-out tree:
//! every manifest file in deployment order, and the image a given file
//! should be deployed with.

use async_recursion::async_recursion;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use harbormaster_core::manifest::ManifestPath;
use harbormaster_core::package::{package_name_of_key, StoredPackage, PACKAGE_KEY_PREFIX};
use harbormaster_core::store::StateStore;
use harbormaster_core::Result;

/// Sentinel image reference meaning "keep whatever image the manifest
/// already specifies". The executor substitutes it like any other value;
/// manifests that embed a real image simply have no marker to replace.
pub const DEFAULT_IMAGE: &str = "default";

/// One manifest file found under the monitored folder.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub path: ManifestPath,
    /// Absolute path inside the checkout, valid in executor jobs too.
    pub absolute: PathBuf,
}

/// A tracked package loaded from the state store.
#[derive(Debug, Clone)]
pub struct TrackedPackage {
    pub name: String,
    pub stored: StoredPackage,
}

/// All manifest files under `root`, in deployment order.
///
/// The walk is recursive; files whose root-relative path does not match
/// the `<order>-<folder>/<order>-<file>.yml` convention are skipped.
pub async fn scan_manifests(root: &Path) -> Result<Vec<ManifestFile>> {
    let mut files = Vec::new();
    walk(root, &mut files).await?;

    let mut manifests = Vec::new();
    for absolute in files {
        let relative = match absolute.strip_prefix(root) {
            Ok(relative) => relative.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        match ManifestPath::parse(&relative) {
            Some(path) => manifests.push(ManifestFile { path, absolute }),
            None => debug!(file = %relative, "Skipping file outside the ordering convention"),
        }
    }
    manifests.sort_by_key(|m| m.path.order_key());
    Ok(manifests)
}

#[async_recursion]
async fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            walk(&path, out).await?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Load every tracked package from the state store. Entries whose value
/// no longer parses are skipped with a warning; they will be rewritten on
/// the next version pass.
pub async fn load_packages(store: &dyn StateStore) -> Result<Vec<TrackedPackage>> {
    let mut packages = Vec::new();
    for (key, value) in store.list(PACKAGE_KEY_PREFIX).await? {
        let Some(name) = package_name_of_key(&key) else {
            continue;
        };
        match StoredPackage::from_json(&value) {
            Some(stored) => packages.push(TrackedPackage {
                name: name.to_string(),
                stored,
            }),
            None => warn!(package = %name, "Stored package entry is unreadable, ignoring"),
        }
    }
    Ok(packages)
}

/// Resolve the image for a manifest file: the first tracked package whose
/// name occurs in the file stem, or [`DEFAULT_IMAGE`] when none does.
pub fn resolve_image(packages: &[TrackedPackage], file_stem: &str) -> String {
    packages
        .iter()
        .find(|package| file_stem.contains(&package.name))
        .map(|package| package.stored.image_url.clone())
        .unwrap_or_else(|| DEFAULT_IMAGE.to_string())
}

/// Linear search for the manifest that deploys a package: the first file
/// whose content contains the `app: <name>` marker.
pub async fn find_manifest_for_app(root: &Path, name: &str) -> Result<Option<ManifestFile>> {
    let marker = format!("app: {name}");
    for manifest in scan_manifests(root).await? {
        let content = match tokio::fs::read_to_string(&manifest.absolute).await {
            Ok(content) => content,
            Err(error) => {
                warn!(file = %manifest.path, %error, "Cannot read manifest, skipping");
                continue;
            }
        };
        if content.contains(&marker) {
            return Ok(Some(manifest));
        }
    }
    Ok(None)
}
