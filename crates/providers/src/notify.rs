//! Delivery channels for operator notifications: chat incoming webhooks and
//! a transactional email HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::http::build_client;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification endpoint returned status {0}")]
    Status(u16),

    #[error("Notification channel not configured: {0}")]
    NotConfigured(String),
}

#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn post(&self, webhook_url: &str, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Posts `{"text": ...}` to an incoming chat webhook.
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: build_client(NOTIFY_TIMEOUT),
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatNotifier for WebhookNotifier {
    async fn post(&self, webhook_url: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from: "Platform Factory <alerts@platform-factory.dev>".to_string(),
        }
    }
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("ALERT_EMAIL_API_KEY").ok(),
            ..Self::default()
        }
    }
}

pub struct EmailClient {
    client: Client,
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: build_client(NOTIFY_TIMEOUT),
            config,
        }
    }
}

#[async_trait]
impl EmailSender for EmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| NotifyError::NotConfigured("ALERT_EMAIL_API_KEY is not set".to_string()))?;

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.config.from,
                "to": [message.to],
                "subject": message.subject,
                "text": message.text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
