//! Shared test fixtures: in-memory seam implementations and a throwaway
//! manifest tree on disk.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

use harbormaster_core::action::DeployAction;
use harbormaster_core::executor::{DeploymentExecutor, Stability};
use harbormaster_core::host::{CommitDetail, CommitFile, CommitInfo, ManifestHost};
use harbormaster_core::package::{RegistryPackage, RegistryVersion};
use harbormaster_core::registry::PackageRegistry;
use harbormaster_core::workspace::ManifestWorkspace;
use harbormaster_core::{Error, Result};

/// Write a manifest tree into a fresh temp directory.
pub fn manifest_tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (relative, content) in files {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create folder");
        }
        std::fs::write(path, content).expect("write manifest");
    }
    dir
}

#[derive(Default)]
pub struct MockRegistry {
    pub packages: Vec<RegistryPackage>,
    pub versions: HashMap<String, Vec<RegistryVersion>>,
    pub fail_listing: bool,
}

impl MockRegistry {
    pub fn with_package(name: &str, id: i64, version: &str) -> Self {
        Self {
            packages: vec![RegistryPackage {
                name: name.to_string(),
                id,
            }],
            versions: HashMap::from([(
                name.to_string(),
                vec![RegistryVersion {
                    name: version.to_string(),
                }],
            )]),
            fail_listing: false,
        }
    }
}

#[async_trait]
impl PackageRegistry for MockRegistry {
    async fn list_packages(&self) -> Result<Vec<RegistryPackage>> {
        if self.fail_listing {
            return Err(Error::Registry("listing unavailable".to_string()));
        }
        Ok(self.packages.clone())
    }

    async fn list_versions(&self, image_name: &str) -> Result<Vec<RegistryVersion>> {
        Ok(self.versions.get(image_name).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MockHost {
    /// Newest first, like the real host.
    pub commits: Vec<CommitInfo>,
    pub details: HashMap<String, CommitDetail>,
}

impl MockHost {
    pub fn with_commit(sha: &str, files: &[(&str, &str)]) -> Self {
        let mut host = Self::default();
        host.push_newest(sha, files);
        host
    }

    /// Prepend a commit as the new history head.
    pub fn push_newest(&mut self, sha: &str, files: &[(&str, &str)]) {
        self.commits.insert(
            0,
            CommitInfo {
                sha: sha.to_string(),
            },
        );
        self.details.insert(
            sha.to_string(),
            CommitDetail {
                files: files
                    .iter()
                    .map(|(filename, status)| CommitFile {
                        filename: filename.to_string(),
                        status: status.to_string(),
                    })
                    .collect(),
            },
        );
    }
}

#[async_trait]
impl ManifestHost for MockHost {
    async fn list_commits(&self) -> Result<Vec<CommitInfo>> {
        Ok(self.commits.clone())
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitDetail> {
        self.details
            .get(sha)
            .cloned()
            .ok_or_else(|| Error::Host(format!("unknown commit {sha}")))
    }
}

/// Workspace over a pre-built tree; checkouts are recorded, not performed.
pub struct FixedWorkspace {
    root: PathBuf,
    pub checkouts: Mutex<Vec<String>>,
}

impl FixedWorkspace {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            checkouts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ManifestWorkspace for FixedWorkspace {
    async fn checkout(&self, sha: &str) -> Result<()> {
        self.checkouts.lock().unwrap().push(sha.to_string());
        Ok(())
    }

    fn manifest_root(&self) -> PathBuf {
        self.root.clone()
    }
}

#[derive(Default)]
pub struct RecordingExecutor {
    actions: Mutex<Vec<DeployAction>>,
}

impl RecordingExecutor {
    pub fn actions(&self) -> Vec<DeployAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentExecutor for RecordingExecutor {
    async fn execute(&self, action: &DeployAction) -> Result<()> {
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn wait_until_stable(
        &self,
        _name_hint: &str,
        _namespace: &str,
        _max_checks: u32,
        _interval: Duration,
    ) -> Result<Stability> {
        Ok(Stability::Stable)
    }
}
