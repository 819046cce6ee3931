use async_trait::async_trait;
use octocrab::Octocrab;
use providers::{ProviderError, Repository, SourceControl};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{GitHubError, Result};

#[derive(Debug, Clone, Default)]
pub struct GitHubConfig {
    /// Overrides `https://api.github.com` (GitHub Enterprise, tests).
    pub api_url: Option<String>,
    pub token: Option<String>,
    /// Organization or user that owns tenant repositories.
    pub owner: Option<String>,
    /// Template repository as `owner/name`. Without one, an empty
    /// initialized repository is created instead.
    pub template: Option<String>,
    pub private: bool,
}

impl GitHubConfig {
    pub fn from_env() -> Self {
        Self {
            token: std::env::var("GITHUB_TOKEN").ok(),
            private: true,
            ..Self::default()
        }
    }
}

pub struct GitHubClient {
    octocrab: Octocrab,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }
        if let Some(api_url) = &config.api_url {
            builder = builder
                .base_uri(api_url.clone())
                .map_err(|e| GitHubError::Config(e.to_string()))?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| GitHubError::Config(e.to_string()))?;

        Ok(Self { octocrab, config })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn owner(&self) -> Result<&str> {
        if self.config.token.as_deref().map_or(true, str::is_empty) {
            return Err(GitHubError::Config("GITHUB_TOKEN not set".to_string()));
        }
        self.config
            .owner
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| GitHubError::Config("repository owner not set".to_string()))
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<Repository>> {
        match self.octocrab.repos(owner, name).get().await {
            Ok(repo) => Ok(Some(convert_repo(repo, owner))),
            Err(e) => match GitHubError::from(e) {
                GitHubError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_repo(&self, owner: &str, name: &str) -> Result<Repository> {
        let repo: octocrab::models::Repository = match &self.config.template {
            Some(template) => {
                info!(owner = %owner, name = %name, template = %template, "Generating repository from template");
                self.octocrab
                    .post(
                        format!("/repos/{}/generate", template),
                        Some(&json!({
                            "owner": owner,
                            "name": name,
                            "private": self.config.private,
                            "include_all_branches": false,
                        })),
                    )
                    .await?
            }
            None => {
                info!(owner = %owner, name = %name, "Creating repository");
                self.octocrab
                    .post(
                        format!("/orgs/{}/repos", owner),
                        Some(&json!({
                            "name": name,
                            "private": self.config.private,
                            "auto_init": true,
                        })),
                    )
                    .await?
            }
        };

        Ok(convert_repo(repo, owner))
    }

    pub async fn ensure_repo(&self, name: &str) -> Result<Repository> {
        let owner = self.owner()?;

        if let Some(existing) = self.get_repo(owner, name).await? {
            debug!(repo = %existing.full_name, "Reusing existing repository");
            return Ok(existing);
        }

        self.create_repo(owner, name).await
    }

    pub async fn path_exists(&self, repo: &str, path: &str) -> Result<bool> {
        self.owner()?;
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| GitHubError::Config(format!("invalid repository name: {}", repo)))?;

        match self
            .octocrab
            .repos(owner, name)
            .get_content()
            .path(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match GitHubError::from(e) {
                GitHubError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }
}

fn convert_repo(repo: octocrab::models::Repository, owner: &str) -> Repository {
    Repository {
        full_name: repo
            .full_name
            .unwrap_or_else(|| format!("{}/{}", owner, repo.name)),
        html_url: repo.html_url.map(|u| u.to_string()).unwrap_or_default(),
        default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn create_or_fetch_repo(&self, name: &str) -> providers::Result<Repository> {
        self.ensure_repo(name).await.map_err(ProviderError::from)
    }

    async fn file_exists(&self, repo: &str, path: &str) -> providers::Result<bool> {
        self.path_exists(repo, path).await.map_err(ProviderError::from)
    }
}
