//! Readiness checks for asynchronous external operations.
//!
//! A verifier inspects the run's metadata, asks its external system whether
//! the operation started by an action has finished, and answers with a
//! [`Verdict`]. Network and parse failures are never a `Fail`; only an
//! explicit error reported by the provider is.

mod database;
mod hosting;
mod source_control;
mod voice;

use async_trait::async_trait;
use factory_core::{ProviderSystem, RunMetadata};
use providers::ProviderError;

pub use database::DatabaseVerifier;
pub use hosting::HostingVerifier;
pub use source_control::SourceControlVerifier;
pub use voice::VoiceAgentVerifier;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Ready. Carries metadata observed while verifying (timestamps).
    Advance(RunMetadata),
    /// Not ready yet; check again after a delay.
    Wait(String),
    /// The provider reported a definitive error.
    Fail(String),
}

impl Verdict {
    pub fn advance() -> Self {
        Self::Advance(RunMetadata::default())
    }
}

#[async_trait]
pub trait StepVerifier: Send + Sync {
    fn system(&self) -> ProviderSystem;

    async fn verify(&self, metadata: &RunMetadata) -> Verdict;
}

/// Verdict for a provider error raised while polling. A missing credential
/// cannot resolve itself by waiting.
pub(crate) fn verdict_for_error(err: &ProviderError) -> Verdict {
    match err {
        ProviderError::Configuration { .. } => Verdict::Fail(err.to_string()),
        _ => Verdict::Wait(err.to_string()),
    }
}

pub(crate) fn missing(field: &str) -> Verdict {
    Verdict::Fail(format!("run metadata is missing {}", field))
}
