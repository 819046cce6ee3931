use serde::{Deserialize, Serialize};

/// A tenant repository on the source-control host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    pub html_url: String,
    pub default_branch: String,
}

impl Repository {
    pub fn owner(&self) -> &str {
        self.full_name.split('/').next().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.full_name.split('/').nth(1).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseProject {
    pub project_ref: String,
    pub name: String,
    pub api_url: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseHealth {
    Ready,
    Pending(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseKeys {
    pub anon_key: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub site_url: String,
    pub redirect_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    /// Absolute URL of this deployment.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
    Ready,
    Building(String),
    Error(String),
}

/// Configuration a deployed tenant site reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub supabase_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceAgent {
    pub agent_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub status: String,
}
