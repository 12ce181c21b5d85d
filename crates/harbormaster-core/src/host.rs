//! Manifest repository host trait: commit history and per-commit file lists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A commit reference in the manifest repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
}

/// One file touched by a commit, as reported by the host. The status is
/// kept raw here; parsing happens against `ChangeStatus` at the call site
/// so unknown statuses can be logged with their original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    pub status: String,
}

/// The detail of one commit: the files it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub files: Vec<CommitFile>,
}

/// Read-only view of the manifest repository's hosted history.
#[async_trait]
pub trait ManifestHost: Send + Sync {
    /// Commit history, newest first.
    async fn list_commits(&self) -> Result<Vec<CommitInfo>>;

    /// The changed-file list of one commit.
    async fn get_commit(&self, sha: &str) -> Result<CommitDetail>;
}
