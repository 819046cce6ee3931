use factory_core::ProviderSystem;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure reported by an external provider, already classified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout, throttling or a 5xx. Worth retrying.
    #[error("{system} is temporarily unavailable: {message}")]
    Transient {
        system: ProviderSystem,
        message: String,
    },

    /// A business-rule rejection such as a name conflict or quota.
    #[error("{system} rejected the request: {message}")]
    Rejected {
        system: ProviderSystem,
        message: String,
    },

    /// A credential or setting needed for the call is missing locally.
    #[error("{system} is not configured: {message}")]
    Configuration {
        system: ProviderSystem,
        message: String,
    },
}

impl ProviderError {
    pub fn transient(system: ProviderSystem, message: impl Into<String>) -> Self {
        Self::Transient {
            system,
            message: message.into(),
        }
    }

    pub fn rejected(system: ProviderSystem, message: impl Into<String>) -> Self {
        Self::Rejected {
            system,
            message: message.into(),
        }
    }

    pub fn configuration(system: ProviderSystem, message: impl Into<String>) -> Self {
        Self::Configuration {
            system,
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(system: ProviderSystem, status: StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("status {}", status)
        } else {
            format!("status {}: {}", status, truncate(body, 500))
        };

        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            Self::transient(system, message)
        } else {
            Self::rejected(system, message)
        }
    }

    /// Transport and decode failures are always transient.
    pub fn request(system: ProviderSystem, err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(system, status, ""),
            None => Self::transient(system, err.to_string()),
        }
    }

    pub fn system(&self) -> ProviderSystem {
        match self {
            Self::Transient { system, .. }
            | Self::Rejected { system, .. }
            | Self::Configuration { system, .. } => *system,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. }
            | Self::Rejected { message, .. }
            | Self::Configuration { message, .. } => message,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
