//! GitHub container package registry client.

use async_trait::async_trait;
use serde::Deserialize;

use harbormaster_core::package::{RegistryPackage, RegistryVersion};
use harbormaster_core::registry::PackageRegistry;
use harbormaster_core::{Error, Result};

use crate::{GitHubError, API_VERSION, USER_AGENT};

/// Container package listing via the GitHub packages API.
pub struct GitHubRegistry {
    client: reqwest::Client,
    api_base: String,
    account: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiPackage {
    name: String,
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiVersion {
    #[serde(default)]
    name: String,
}

impl GitHubRegistry {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_api_base("https://api.github.com", account, token)
    }

    /// Point the client at a different API base (tests, GHES).
    pub fn with_api_base(
        api_base: impl Into<String>,
        account: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            account: account.into(),
            token: token.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, GitHubError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api(format!("{status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PackageRegistry for GitHubRegistry {
    async fn list_packages(&self) -> Result<Vec<RegistryPackage>> {
        let url = format!(
            "{}/users/{}/packages?package_type=container",
            self.api_base, self.account
        );
        let packages: Vec<ApiPackage> = self
            .get_json(&url)
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;

        Ok(packages
            .into_iter()
            .map(|p| RegistryPackage {
                name: p.name,
                id: p.id,
            })
            .collect())
    }

    async fn list_versions(&self, image_name: &str) -> Result<Vec<RegistryVersion>> {
        let url = format!(
            "{}/user/packages/container/{}/versions",
            self.api_base, image_name
        );
        let versions: Vec<ApiVersion> = self
            .get_json(&url)
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;

        Ok(versions
            .into_iter()
            .map(|v| RegistryVersion { name: v.name })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_listing_shape() {
        let body = r#"[
            {"name": "acme-app", "id": 101, "package_type": "container"},
            {"name": "harbormaster", "id": 102, "package_type": "container"}
        ]"#;
        let packages: Vec<ApiPackage> = serde_json::from_str(body).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "acme-app");
        assert_eq!(packages[1].id, 102);
    }

    #[test]
    fn test_version_listing_tolerates_missing_name() {
        let body = r#"[{"id": 7}, {"name": "sha256:abc", "id": 8}]"#;
        let versions: Vec<ApiVersion> = serde_json::from_str(body).unwrap();
        assert_eq!(versions[0].name, "");
        assert_eq!(versions[1].name, "sha256:abc");
    }
}
