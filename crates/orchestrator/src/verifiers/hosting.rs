use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use factory_core::{ProviderSystem, RunMetadata, VercelMetadata};
use providers::{DeploymentState, HostingProvider};

use super::{missing, verdict_for_error, StepVerifier, Verdict};

/// Ready once the recorded deployment reports ready; fails on a build error.
pub struct HostingVerifier {
    hosting: Arc<dyn HostingProvider>,
}

impl HostingVerifier {
    pub fn new(hosting: Arc<dyn HostingProvider>) -> Self {
        Self { hosting }
    }
}

#[async_trait]
impl StepVerifier for HostingVerifier {
    fn system(&self) -> ProviderSystem {
        ProviderSystem::Vercel
    }

    async fn verify(&self, metadata: &RunMetadata) -> Verdict {
        let Some(deployment_id) = metadata.vercel().deployment_id else {
            return missing("vercel.deploymentId");
        };

        match self.hosting.deployment_status(&deployment_id).await {
            Ok(DeploymentState::Ready) => Verdict::Advance(RunMetadata {
                vercel: Some(VercelMetadata {
                    ready_at: Some(Utc::now()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            Ok(DeploymentState::Building(state)) => {
                Verdict::Wait(format!("deployment {} is {}", deployment_id, state))
            }
            Ok(DeploymentState::Error(message)) => Verdict::Fail(message),
            Err(e) => verdict_for_error(&e),
        }
    }
}
