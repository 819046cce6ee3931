use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AuthSettings, Customer, DatabaseHealth, DatabaseKeys, DatabaseProject, Deployment,
    DeploymentState, EnvVar, HostingProject, Repository, SiteConfig, Subscription, VoiceAgent,
};

/// Source-control host (repositories generated from a template).
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Return the repository `name` in the configured owner, generating it
    /// from the template when it does not exist yet.
    async fn create_or_fetch_repo(&self, name: &str) -> Result<Repository>;

    /// Whether `path` can be fetched from `repo` (`owner/name`).
    async fn file_exists(&self, repo: &str, path: &str) -> Result<bool>;
}

/// Database-as-a-service provider.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    async fn create_or_fetch_project(&self, name: &str) -> Result<DatabaseProject>;

    async fn project_health(&self, project_ref: &str) -> Result<DatabaseHealth>;

    async fn fetch_api_keys(&self, project_ref: &str) -> Result<DatabaseKeys>;

    /// Run schema SQL. The SQL itself must be idempotent.
    async fn apply_schema(&self, project_ref: &str, sql: &str) -> Result<()>;

    async fn configure_auth(&self, project_ref: &str, settings: &AuthSettings) -> Result<()>;

    async fn ensure_storage_bucket(
        &self,
        project: &DatabaseProject,
        bucket: &str,
    ) -> Result<()>;
}

/// Hosting provider.
#[async_trait]
pub trait HostingProvider: Send + Sync {
    /// Create (or look up) the hosting project `name` linked to `repo` (`owner/name`).
    async fn create_or_fetch_project(&self, name: &str, repo: &str) -> Result<HostingProject>;

    /// Insert or overwrite environment variables on a project.
    async fn upsert_env_vars(&self, project_id: &str, vars: &[EnvVar]) -> Result<()>;

    async fn trigger_deployment(
        &self,
        project: &HostingProject,
        repo: &str,
        git_ref: &str,
    ) -> Result<Deployment>;

    async fn deployment_status(&self, deployment_id: &str) -> Result<DeploymentState>;

    /// Ask a deployed site for the configuration it is running with.
    async fn fetch_site_config(&self, site_url: &str) -> Result<SiteConfig>;
}

/// Conversational voice-agent provider.
#[async_trait]
pub trait VoiceAgentProvider: Send + Sync {
    async fn create_or_fetch_agent(&self, name: &str) -> Result<VoiceAgent>;

    async fn signed_session_url(&self, agent_id: &str) -> Result<String>;

    /// Send a synthetic user message and return the agent's reply text.
    async fn probe(&self, agent_id: &str, message: &str) -> Result<String>;
}

/// Payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_or_fetch_customer(&self, project_slug: &str) -> Result<Customer>;

    async fn create_or_fetch_subscription(
        &self,
        customer_id: &str,
        project_slug: &str,
    ) -> Result<Subscription>;
}
