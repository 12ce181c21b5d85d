//! GitHub commit history client for the manifest repository.

use async_trait::async_trait;
use serde::Deserialize;

use harbormaster_core::host::{CommitDetail, CommitFile, CommitInfo, ManifestHost};
use harbormaster_core::{Error, Result};

use crate::{GitHubError, API_VERSION, USER_AGENT};

/// Commit listings via the GitHub repos API.
pub struct GitHubHost {
    client: reqwest::Client,
    api_base: String,
    account: String,
    repo: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    files: Vec<ApiCommitFile>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitFile {
    filename: String,
    status: String,
}

impl GitHubHost {
    pub fn new(
        account: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self::with_api_base("https://api.github.com", account, repo, token)
    }

    pub fn with_api_base(
        api_base: impl Into<String>,
        account: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            account: account.into(),
            repo: repo.into(),
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
impl ManifestHost for GitHubHost {
    async fn list_commits(&self) -> Result<Vec<CommitInfo>> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            self.api_base, self.account, self.repo
        );
        let commits: Vec<ApiCommit> = self
            .get_json(&url)
            .await
            .map_err(|e| Error::Host(e.to_string()))?;

        Ok(commits
            .into_iter()
            .map(|c| CommitInfo { sha: c.sha })
            .collect())
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitDetail> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_base, self.account, self.repo, sha
        );
        let detail: ApiCommitDetail = self
            .get_json(&url)
            .await
            .map_err(|e| Error::Host(e.to_string()))?;

        Ok(CommitDetail {
            files: detail
                .files
                .into_iter()
                .map(|f| CommitFile {
                    filename: f.filename,
                    status: f.status,
                })
                .collect(),
        })
    }
}
