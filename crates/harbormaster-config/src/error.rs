//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {message}")]
    InvalidValue {
        name: &'static str,
        message: String,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
