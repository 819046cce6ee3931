use factory_core::{CoreError, ProviderSystem};
use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{system} is temporarily unavailable: {message}")]
    TransientProvider {
        system: ProviderSystem,
        message: String,
    },

    #[error("{system} rejected the request: {message}")]
    ProviderRejected {
        system: ProviderSystem,
        message: String,
    },

    #[error("{system} is not configured: {message}")]
    Configuration {
        system: ProviderSystem,
        message: String,
    },

    #[error("{system} verification failed: {message}")]
    VerificationFailed {
        system: ProviderSystem,
        message: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] db::DbError),

    #[error("Provision run not found: {0}")]
    RunNotFound(String),

    #[error("Provisioning already in progress for {0}")]
    RunAlreadyActive(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    InvalidRequest(#[from] CoreError),
}

impl ProvisionError {
    pub fn verification_failed(system: ProviderSystem, message: impl Into<String>) -> Self {
        Self::VerificationFailed {
            system,
            message: message.into(),
        }
    }

    /// Stable classification prefix recorded in a failed run's `error`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientProvider { .. } => "transient_provider_error",
            Self::ProviderRejected { .. } => "provider_rejected",
            Self::Configuration { .. } => "configuration_error",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::Store(_) => "store_error",
            Self::RunNotFound(_) => "run_not_found",
            Self::RunAlreadyActive(_) => "run_already_active",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientProvider { .. })
    }

    /// The message stored on a FAILED run.
    pub fn run_error(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<ProviderError> for ProvisionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transient { system, message } => {
                Self::TransientProvider { system, message }
            }
            ProviderError::Rejected { system, message } => {
                Self::ProviderRejected { system, message }
            }
            ProviderError::Configuration { system, message } => {
                Self::Configuration { system, message }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
