use async_trait::async_trait;
use factory_core::ProviderSystem;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{build_client, read_json, require, send, send_json, send_optional, DEFAULT_TIMEOUT};
use crate::traits::HostingProvider;
use crate::types::{Deployment, DeploymentState, EnvVar, HostingProject, SiteConfig};

const SYSTEM: ProviderSystem = ProviderSystem::Vercel;

#[derive(Debug, Clone)]
pub struct VercelConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub team_id: Option<String>,
    pub framework: String,
    /// Path on a deployed tenant site that reports its runtime configuration.
    pub site_config_path: String,
}

impl Default for VercelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.vercel.com".to_string(),
            token: None,
            team_id: None,
            framework: "nextjs".to_string(),
            site_config_path: "/api/config".to_string(),
        }
    }
}

impl VercelConfig {
    pub fn from_env() -> Self {
        Self {
            token: std::env::var("VERCEL_TOKEN").ok(),
            team_id: std::env::var("VERCEL_TEAM_ID").ok(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ready_state: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnvVarBody<'a> {
    key: &'a str,
    value: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    target: [&'static str; 3],
}

pub struct VercelClient {
    client: Client,
    config: VercelConfig,
}

impl VercelClient {
    pub fn new(config: VercelConfig) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            config,
        }
    }

    pub fn with_client(config: VercelConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = require(SYSTEM, &self.config.token, "VERCEL_TOKEN")?;
        let request = request.bearer_auth(token);
        Ok(match &self.config.team_id {
            Some(team_id) => request.query(&[("teamId", team_id)]),
            None => request,
        })
    }
}

fn to_deployment(response: &DeploymentResponse) -> Deployment {
    let url = response.url.clone().unwrap_or_default();
    Deployment {
        id: response.id.clone(),
        url: if url.starts_with("http") {
            url
        } else {
            format!("https://{}", url)
        },
    }
}

#[async_trait]
impl HostingProvider for VercelClient {
    async fn create_or_fetch_project(&self, name: &str, repo: &str) -> Result<HostingProject> {
        let existing = send_optional(
            SYSTEM,
            self.authorized(self.client.get(self.url(&format!("/v9/projects/{}", name))))?,
        )
        .await?;

        if let Some(response) = existing {
            let project: ProjectResponse = read_json(SYSTEM, response).await?;
            debug!(project_id = %project.id, "Reusing existing hosting project");
            return Ok(HostingProject {
                id: project.id,
                name: project.name,
            });
        }

        info!(name = %name, repo = %repo, "Creating hosting project");
        let project: ProjectResponse = send_json(
            SYSTEM,
            self.authorized(self.client.post(self.url("/v10/projects")))?
                .json(&json!({
                    "name": name,
                    "framework": self.config.framework,
                    "gitRepository": { "type": "github", "repo": repo },
                })),
        )
        .await?;

        Ok(HostingProject {
            id: project.id,
            name: project.name,
        })
    }

    async fn upsert_env_vars(&self, project_id: &str, vars: &[EnvVar]) -> Result<()> {
        let body: Vec<EnvVarBody<'_>> = vars
            .iter()
            .map(|v| EnvVarBody {
                key: &v.key,
                value: &v.value,
                kind: "encrypted",
                target: ["production", "preview", "development"],
            })
            .collect();

        send(
            SYSTEM,
            self.authorized(
                self.client
                    .post(self.url(&format!("/v10/projects/{}/env", project_id))),
            )?
            .query(&[("upsert", "true")])
            .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn trigger_deployment(
        &self,
        project: &HostingProject,
        repo: &str,
        git_ref: &str,
    ) -> Result<Deployment> {
        let (org, repo_name) = repo.split_once('/').unwrap_or(("", repo));

        info!(project = %project.name, git_ref = %git_ref, "Triggering deployment");
        let response: DeploymentResponse = send_json(
            SYSTEM,
            self.authorized(self.client.post(self.url("/v13/deployments")))?
                .json(&json!({
                    "name": project.name,
                    "project": project.id,
                    "target": "production",
                    "gitSource": {
                        "type": "github",
                        "org": org,
                        "repo": repo_name,
                        "ref": git_ref,
                    },
                })),
        )
        .await?;

        Ok(to_deployment(&response))
    }

    async fn deployment_status(&self, deployment_id: &str) -> Result<DeploymentState> {
        let response: DeploymentResponse = send_json(
            SYSTEM,
            self.authorized(
                self.client
                    .get(self.url(&format!("/v13/deployments/{}", deployment_id))),
            )?,
        )
        .await?;

        let ready_state = response.ready_state.unwrap_or_default();
        Ok(match ready_state.as_str() {
            "READY" => DeploymentState::Ready,
            "ERROR" | "CANCELED" => DeploymentState::Error(
                response
                    .error_message
                    .unwrap_or_else(|| format!("deployment {}", ready_state.to_lowercase())),
            ),
            _ => DeploymentState::Building(ready_state),
        })
    }

    async fn fetch_site_config(&self, site_url: &str) -> Result<SiteConfig> {
        send_json(
            SYSTEM,
            self.client.get(format!(
                "{}{}",
                site_url.trim_end_matches('/'),
                self.config.site_config_path
            )),
        )
        .await
    }
}
