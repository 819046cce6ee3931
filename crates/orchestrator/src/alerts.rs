//! Failure alerting.
//!
//! The destination is a pure function of the project slug; delivery is best
//! effort and never surfaces an error to the orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use factory_core::{ProvisionState, RunMetadata};
use providers::{ChatNotifier, EmailMessage, EmailSender, NotifyError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertTarget {
    pub chat_webhook_url: Option<String>,
    pub email_address: Option<String>,
}

impl AlertTarget {
    pub fn is_empty(&self) -> bool {
        self.chat_webhook_url.is_none() && self.email_address.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRoutingConfig {
    /// Destination for slugs matching one of `dev_prefixes`.
    pub dev: AlertTarget,
    /// Destination for every other slug.
    pub ops: AlertTarget,
    pub dev_prefixes: Vec<String>,
}

impl Default for AlertRoutingConfig {
    fn default() -> Self {
        Self {
            dev: AlertTarget::default(),
            ops: AlertTarget::default(),
            dev_prefixes: vec!["demo-".to_string()],
        }
    }
}

impl AlertRoutingConfig {
    pub fn resolve_alert_target(&self, project_slug: &str) -> &AlertTarget {
        if self
            .dev_prefixes
            .iter()
            .any(|prefix| project_slug.starts_with(prefix.as_str()))
        {
            &self.dev
        } else {
            &self.ops
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureAlert {
    pub project_slug: String,
    /// The state the run failed in.
    pub state: ProvisionState,
    pub error: String,
    pub metadata: RunMetadata,
}

impl FailureAlert {
    pub fn subject(&self) -> String {
        format!("Provisioning failed for {}", self.project_slug)
    }

    pub fn text(&self) -> String {
        let recorded = self
            .metadata
            .recorded_systems()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Provisioning failed for {} at {}.\nError: {}\nRecorded systems: {}",
            self.project_slug,
            self.state,
            self.error,
            if recorded.is_empty() { "none" } else { recorded.as_str() }
        )
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, alert: &FailureAlert);
}

pub struct AlertRouter {
    config: AlertRoutingConfig,
    chat: Arc<dyn ChatNotifier>,
    email: Arc<dyn EmailSender>,
}

impl AlertRouter {
    pub fn new(
        config: AlertRoutingConfig,
        chat: Arc<dyn ChatNotifier>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self { config, chat, email }
    }

    pub fn resolve_alert_target(&self, project_slug: &str) -> &AlertTarget {
        self.config.resolve_alert_target(project_slug)
    }
}

#[async_trait]
impl AlertSink for AlertRouter {
    async fn send_alert(&self, alert: &FailureAlert) {
        let target = self.resolve_alert_target(&alert.project_slug);
        if target.is_empty() {
            info!(project_slug = %alert.project_slug, "No alert destination configured");
            return;
        }

        if let Some(webhook_url) = &target.chat_webhook_url {
            if let Err(e) = self.chat.post(webhook_url, &alert.text()).await {
                warn!(project_slug = %alert.project_slug, error = %e, "Chat alert delivery failed");
            }
        }

        if let Some(address) = &target.email_address {
            let message = EmailMessage {
                to: address.clone(),
                subject: alert.subject(),
                text: alert.text(),
            };
            match self.email.send(&message).await {
                Ok(()) => {}
                Err(NotifyError::NotConfigured(reason)) => {
                    warn!(project_slug = %alert.project_slug, reason = %reason, "Skipping email alert");
                }
                Err(e) => {
                    warn!(project_slug = %alert.project_slug, error = %e, "Email alert delivery failed");
                }
            }
        }
    }
}
