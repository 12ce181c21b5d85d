//! Package registry trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::package::{RegistryPackage, RegistryVersion};

/// Read-only view of the container registry for one account.
///
/// Failures are transient by nature (network, rate limits); callers treat
/// them as "no change this cycle" rather than propagating them as fatal.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// All container packages published under the account.
    async fn list_packages(&self) -> Result<Vec<RegistryPackage>>;

    /// Published versions of one package, newest first. `image_name` is
    /// the registry-side name (with the custom prefix, when one applies).
    async fn list_versions(&self, image_name: &str) -> Result<Vec<RegistryVersion>>;
}
