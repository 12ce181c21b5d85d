//! Environment configuration for the Harbormaster GitOps controller.
//!
//! All configuration comes from environment variables read once at
//! startup. Nothing here is hot-reloadable: the controller is restarted to
//! pick up new settings.

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{AccessTokens, Settings};
