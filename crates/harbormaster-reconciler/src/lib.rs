//! The reconciliation engine.
//!
//! Three cooperating pieces, driven by [`ReconcileLoop`]:
//!
//! - [`VersionReconciler`] diffs the container registry against the state
//!   store and redeploys workloads whose image moved.
//! - [`CommitReconciler`] diffs the manifest repository's history against
//!   the last applied commit and applies manifest changes in order.
//! - [`DependencyPropagator`] redeploys workloads that reference a changed
//!   ConfigMap or Secret.
//!
//! All three talk to the outside world exclusively through the traits in
//! `harbormaster-core`, so the whole engine runs against in-memory fakes
//! in tests.

pub mod commits;
pub mod propagate;
pub mod resolve;
pub mod runner;
pub mod versions;

pub use commits::CommitReconciler;
pub use propagate::DependencyPropagator;
pub use runner::ReconcileLoop;
pub use versions::{VersionOptions, VersionReconciler};

#[cfg(test)]
pub(crate) mod testing;
