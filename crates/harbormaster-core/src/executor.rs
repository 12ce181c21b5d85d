//! Deployment executor trait.

use async_trait::async_trait;
use std::time::Duration;

use crate::action::DeployAction;
use crate::error::Result;

/// Outcome of waiting for a resource's pods to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// No pod for the resource is in a transient state.
    Stable,
    /// The poll budget ran out with pods still transient. The loop
    /// proceeds anyway: liveness over certainty.
    Unstable,
}

/// Performs deploy actions against the cluster.
///
/// `execute` blocks until the affected resource's pods have left transient
/// states (bounded). An execution failure is logged by the caller and does
/// not abort the reconciliation pass: idempotence comes from the target
/// resources being declarative, not from this interface.
#[async_trait]
pub trait DeploymentExecutor: Send + Sync {
    /// Apply, delete, or delete-then-apply one manifest.
    async fn execute(&self, action: &DeployAction) -> Result<()>;

    /// Poll until no pod whose name contains `name_hint` in `namespace` is
    /// pending or creating, up to `max_checks` polls `interval` apart.
    async fn wait_until_stable(
        &self,
        name_hint: &str,
        namespace: &str,
        max_checks: u32,
        interval: Duration,
    ) -> Result<Stability>;
}
