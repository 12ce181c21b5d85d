//! Deployment execution backend for Harbormaster.
//!
//! The single production executor spawns a Kubernetes Job running a
//! kubectl shell pipeline against the shared manifest volume.

pub mod kubectl;

pub use kubectl::{KubectlJobExecutor, RunnerSettings};

pub use harbormaster_core::executor::{DeploymentExecutor, Stability};
