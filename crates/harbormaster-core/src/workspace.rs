//! Checked-out manifest tree trait.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// The local, commit-addressable checkout of the manifest repository.
///
/// Single writer: only the reconciliation loop moves the checkout, and the
/// loop is strictly sequential.
#[async_trait]
pub trait ManifestWorkspace: Send + Sync {
    /// Clone the repository if needed, fetch, and check out the commit.
    async fn checkout(&self, sha: &str) -> Result<()>;

    /// Absolute path of the monitored folder inside the checkout.
    fn manifest_root(&self) -> PathBuf;
}
