use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use factory_core::{GithubMetadata, ProviderSystem, RunMetadata};
use providers::SourceControl;
use tracing::debug;

use super::{missing, verdict_for_error, StepVerifier, Verdict};

/// Ready once a known file can be fetched from the new repository.
pub struct SourceControlVerifier {
    source_control: Arc<dyn SourceControl>,
    path: String,
}

impl SourceControlVerifier {
    pub fn new(source_control: Arc<dyn SourceControl>, path: impl Into<String>) -> Self {
        Self {
            source_control,
            path: path.into(),
        }
    }
}

#[async_trait]
impl StepVerifier for SourceControlVerifier {
    fn system(&self) -> ProviderSystem {
        ProviderSystem::Github
    }

    async fn verify(&self, metadata: &RunMetadata) -> Verdict {
        let Some(repo) = metadata.github().repo else {
            return missing("github.repo");
        };

        match self.source_control.file_exists(&repo, &self.path).await {
            Ok(true) => Verdict::Advance(RunMetadata {
                github: Some(GithubMetadata {
                    verified_at: Some(Utc::now()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            Ok(false) => {
                debug!(repo = %repo, path = %self.path, "Repository content not available yet");
                Verdict::Wait(format!("{} not yet present in {}", self.path, repo))
            }
            Err(e) => verdict_for_error(&e),
        }
    }
}
