//! Container package tracking types and state-store key layout.

use serde::{Deserialize, Serialize};

/// State-store key prefix for tracked packages.
pub const PACKAGE_KEY_PREFIX: &str = "package:";

/// State-store key holding the last fully applied commit SHA.
pub const COMMIT_KEY: &str = "commit:current";

/// The state-store key for a tracked package.
pub fn package_key(name: &str) -> String {
    format!("{PACKAGE_KEY_PREFIX}{name}")
}

/// The tracked package name for a state-store key, if it is one.
pub fn package_name_of_key(key: &str) -> Option<&str> {
    key.strip_prefix(PACKAGE_KEY_PREFIX)
}

/// A container package as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPackage {
    pub name: String,
    pub id: i64,
}

/// One published version of a package. Only the tag name matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryVersion {
    pub name: String,
}

/// The persisted view of a package: the registry id and the image URL
/// last seen for it. Serialized as JSON into the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPackage {
    pub id: i64,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl StoredPackage {
    pub fn to_json(&self) -> String {
        // Serialization of this struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(value: &str) -> Option<StoredPackage> {
        serde_json::from_str(value).ok()
    }
}

/// Build the full image reference for a package version:
/// `<registry>/<account>/<image>:main@<version>`.
pub fn image_url(registry_host: &str, account: &str, image_name: &str, version: &str) -> String {
    format!("{registry_host}/{account}/{image_name}:main@{version}")
}
