//! GitHub-backed implementations of the Harbormaster external seams.
//!
//! - [`GitHubRegistry`]: container package listing via the GitHub packages
//!   API (`PackageRegistry`).
//! - [`GitHubHost`]: commit history and per-commit file lists via the
//!   GitHub repos API (`ManifestHost`).
//! - [`GitWorkspace`]: the local checkout, driven by the `git` binary
//!   (`ManifestWorkspace`).

pub mod git;
pub mod host;
pub mod registry;

pub use git::GitWorkspace;
pub use host::GitHubHost;
pub use registry::GitHubRegistry;

use thiserror::Error;

/// GitHub API errors.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub(crate) const API_VERSION: &str = "2022-11-28";
pub(crate) const USER_AGENT: &str = "Harbormaster";
