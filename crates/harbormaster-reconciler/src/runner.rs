//! The outer reconciliation loop.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::commits::CommitReconciler;
use crate::versions::VersionReconciler;

/// Runs the two reconcilers in sequence, forever, one cycle per interval.
/// Cycles never overlap and no error ends the loop; a failed pass degrades
/// to a no-op cycle and the next cycle recomputes from scratch.
pub struct ReconcileLoop {
    versions: VersionReconciler,
    commits: CommitReconciler,
    interval: Duration,
}

impl ReconcileLoop {
    pub fn new(versions: VersionReconciler, commits: CommitReconciler, interval: Duration) -> Self {
        Self {
            versions,
            commits,
            interval,
        }
    }

    /// One full pass: versions, then commits.
    pub async fn run_once(&self) {
        match self.versions.reconcile().await {
            Ok(actions) => debug!(count = actions.len(), "Version pass finished"),
            Err(e) => error!(error = %e, "Version pass failed"),
        }
        if let Err(e) = self.commits.reconcile().await {
            error!(error = %e, "Commit pass failed");
        }
    }

    /// Run until the process dies. Lifetime is controlled externally.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Reconciliation loop started");
        loop {
            self.run_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}
