use async_trait::async_trait;
use factory_core::ProviderSystem;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{ProviderError, Result};
use crate::http::{build_client, read_json, require, send, send_json, send_optional, DEFAULT_TIMEOUT};
use crate::traits::DatabaseProvider;
use crate::types::{AuthSettings, DatabaseHealth, DatabaseKeys, DatabaseProject};

const SYSTEM: ProviderSystem = ProviderSystem::Supabase;

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub management_url: String,
    /// Project API URL with a `{ref}` placeholder.
    pub project_url_template: String,
    pub access_token: Option<String>,
    pub organization_id: Option<String>,
    pub db_password: Option<String>,
    pub region: String,
    pub plan: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            management_url: "https://api.supabase.com".to_string(),
            project_url_template: "https://{ref}.supabase.co".to_string(),
            access_token: None,
            organization_id: None,
            db_password: None,
            region: "us-east-1".to_string(),
            plan: "free".to_string(),
        }
    }
}

impl SupabaseConfig {
    /// Defaults with secrets taken from `SUPABASE_ACCESS_TOKEN` and
    /// `SUPABASE_DB_PASSWORD`.
    pub fn from_env() -> Self {
        Self {
            access_token: std::env::var("SUPABASE_ACCESS_TOKEN").ok(),
            db_password: std::env::var("SUPABASE_DB_PASSWORD").ok(),
            ..Self::default()
        }
    }

    pub fn project_url(&self, project_ref: &str) -> String {
        self.project_url_template.replace("{ref}", project_ref)
    }
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    id: String,
    name: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateProjectRequest<'a> {
    name: &'a str,
    organization_id: &'a str,
    db_pass: &'a str,
    region: &'a str,
    plan: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiKey {
    name: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    id: String,
}

pub struct SupabaseClient {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            config,
        }
    }

    pub fn with_client(config: SupabaseConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn token(&self) -> Result<&str> {
        require(SYSTEM, &self.config.access_token, "SUPABASE_ACCESS_TOKEN")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.management_url, path)
    }

    fn to_project(&self, project: ProjectResponse) -> DatabaseProject {
        DatabaseProject {
            api_url: self.config.project_url(&project.id),
            project_ref: project.id,
            name: project.name,
            region: project.region,
        }
    }

    async fn find_project(&self, name: &str) -> Result<Option<ProjectResponse>> {
        let projects: Vec<ProjectResponse> = send_json(
            SYSTEM,
            self.client
                .get(self.url("/v1/projects"))
                .bearer_auth(self.token()?),
        )
        .await?;

        Ok(projects.into_iter().find(|p| p.name == name))
    }
}

#[async_trait]
impl DatabaseProvider for SupabaseClient {
    async fn create_or_fetch_project(&self, name: &str) -> Result<DatabaseProject> {
        let token = self.token()?;

        if let Some(existing) = self.find_project(name).await? {
            debug!(project_ref = %existing.id, "Reusing existing database project");
            return Ok(self.to_project(existing));
        }

        let request = CreateProjectRequest {
            name,
            organization_id: require(SYSTEM, &self.config.organization_id, "supabase organization id")?,
            db_pass: require(SYSTEM, &self.config.db_password, "SUPABASE_DB_PASSWORD")?,
            region: &self.config.region,
            plan: &self.config.plan,
        };

        info!(name = %name, region = %self.config.region, "Creating database project");
        let created: ProjectResponse = send_json(
            SYSTEM,
            self.client
                .post(self.url("/v1/projects"))
                .bearer_auth(token)
                .json(&request),
        )
        .await?;

        Ok(self.to_project(created))
    }

    async fn project_health(&self, project_ref: &str) -> Result<DatabaseHealth> {
        let project: ProjectResponse = send_json(
            SYSTEM,
            self.client
                .get(self.url(&format!("/v1/projects/{}", project_ref)))
                .bearer_auth(self.token()?),
        )
        .await?;

        let status = project.status.unwrap_or_default();
        Ok(match status.as_str() {
            "ACTIVE_HEALTHY" => DatabaseHealth::Ready,
            "INIT_FAILED" | "REMOVED" | "GOING_DOWN" | "INACTIVE" => DatabaseHealth::Failed(status),
            _ => DatabaseHealth::Pending(status),
        })
    }

    async fn fetch_api_keys(&self, project_ref: &str) -> Result<DatabaseKeys> {
        let keys: Vec<ApiKey> = send_json(
            SYSTEM,
            self.client
                .get(self.url(&format!("/v1/projects/{}/api-keys", project_ref)))
                .bearer_auth(self.token()?),
        )
        .await?;

        let find = |name: &str| {
            keys.iter()
                .find(|k| k.name == name)
                .map(|k| k.api_key.clone())
                .ok_or_else(|| {
                    ProviderError::transient(SYSTEM, format!("{} key not available yet", name))
                })
        };

        Ok(DatabaseKeys {
            anon_key: find("anon")?,
            service_role_key: find("service_role")?,
        })
    }

    async fn apply_schema(&self, project_ref: &str, sql: &str) -> Result<()> {
        info!(project_ref = %project_ref, "Applying schema");
        send(
            SYSTEM,
            self.client
                .post(self.url(&format!("/v1/projects/{}/database/query", project_ref)))
                .bearer_auth(self.token()?)
                .json(&json!({ "query": sql })),
        )
        .await?;
        Ok(())
    }

    async fn configure_auth(&self, project_ref: &str, settings: &AuthSettings) -> Result<()> {
        send(
            SYSTEM,
            self.client
                .patch(self.url(&format!("/v1/projects/{}/config/auth", project_ref)))
                .bearer_auth(self.token()?)
                .json(&json!({
                    "site_url": settings.site_url,
                    "uri_allow_list": settings.redirect_urls.join(","),
                })),
        )
        .await?;
        Ok(())
    }

    async fn ensure_storage_bucket(&self, project: &DatabaseProject, bucket: &str) -> Result<()> {
        let keys = self.fetch_api_keys(&project.project_ref).await?;
        let bucket_url = format!("{}/storage/v1/bucket", project.api_url);

        let existing = send_optional(
            SYSTEM,
            self.client
                .get(&bucket_url)
                .header("apikey", &keys.service_role_key)
                .bearer_auth(&keys.service_role_key),
        )
        .await?;

        if let Some(response) = existing {
            let buckets: Vec<Bucket> = read_json(SYSTEM, response).await?;
            if buckets.iter().any(|b| b.id == bucket) {
                debug!(bucket = %bucket, "Storage bucket already exists");
                return Ok(());
            }
        }

        info!(bucket = %bucket, project_ref = %project.project_ref, "Creating storage bucket");
        send(
            SYSTEM,
            self.client
                .post(&bucket_url)
                .header("apikey", &keys.service_role_key)
                .bearer_auth(&keys.service_role_key)
                .json(&json!({ "id": bucket, "name": bucket, "public": false })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url_template() {
        let config = SupabaseConfig::default();
        assert_eq!(config.project_url("abc123"), "https://abc123.supabase.co");
    }

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let client = SupabaseClient::new(SupabaseConfig::default());

        let err = client.create_or_fetch_project("acme-42").await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration { system: ProviderSystem::Supabase, .. }));
    }
}
