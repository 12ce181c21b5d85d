//! Error types for Harbormaster.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("registry error: {0}")]
    Registry(String),

    #[error("manifest host error: {0}")]
    Host(String),

    #[error("state store error: {0}")]
    Store(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
