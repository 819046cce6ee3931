use std::collections::HashMap;
use std::path::{Path, PathBuf};

use orchestrator::{AlertRoutingConfig, ProvisionSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "platform-factory.toml";
pub const DEFAULT_PORT: u16 = 3001;

/// Settings loaded from `platform-factory.toml`. Secrets never live here;
/// provider credentials come from the environment only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub server: ServerConfig,
    pub provisioning: ProvisioningConfig,
    pub alerts: AlertsConfig,
    /// Per-system retry policy overrides, keyed by system name.
    pub retry: HashMap<String, RetryPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Re-drive every unfinished run when the server boots.
    pub resume_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database_url: "sqlite:platform-factory.db".to_string(),
            resume_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub resource_prefix: String,
    pub hosting_domain: String,
    /// Template repository as `owner/name`.
    pub template_repository: Option<String>,
    /// Organization or user that owns tenant repositories.
    pub source_control_org: Option<String>,
    pub private_repositories: bool,
    pub verification_path: String,
    pub database_organization: Option<String>,
    pub database_region: Option<String>,
    pub storage_bucket: String,
    pub schema_sql_path: Option<PathBuf>,
    pub schema_version: String,
    pub auth_callback_path: String,
    pub probe_message: String,
    pub hosting_team_id: Option<String>,
    pub payment_price_id: Option<String>,
    pub voice_id: Option<String>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        let settings = ProvisionSettings::default();
        Self {
            resource_prefix: settings.resource_prefix,
            hosting_domain: settings.hosting_domain,
            template_repository: None,
            source_control_org: None,
            private_repositories: true,
            verification_path: settings.verification_path,
            database_organization: None,
            database_region: None,
            storage_bucket: settings.storage_bucket,
            schema_sql_path: None,
            schema_version: settings.schema_version,
            auth_callback_path: settings.auth_callback_path,
            probe_message: settings.probe_message,
            hosting_team_id: None,
            payment_price_id: None,
            voice_id: None,
        }
    }
}

impl ProvisioningConfig {
    /// Resolve the orchestrator settings, reading the schema SQL file when
    /// one is configured.
    pub async fn settings(&self) -> std::io::Result<ProvisionSettings> {
        let schema_sql = match &self.schema_sql_path {
            Some(path) => fs::read_to_string(path).await?,
            None => String::new(),
        };

        Ok(ProvisionSettings {
            resource_prefix: self.resource_prefix.clone(),
            hosting_domain: self.hosting_domain.clone(),
            verification_path: self.verification_path.clone(),
            storage_bucket: self.storage_bucket.clone(),
            schema_sql,
            schema_version: self.schema_version.clone(),
            auth_callback_path: self.auth_callback_path.clone(),
            probe_message: self.probe_message.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    #[serde(flatten)]
    pub routing: AlertRoutingConfig,
    /// Sender address for alert emails.
    pub email_from: Option<String>,
}

impl FactoryConfig {
    /// Load from `path`. A missing or unparsable file yields the defaults.
    pub async fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }
}
