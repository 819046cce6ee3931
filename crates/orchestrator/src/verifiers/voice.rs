use std::sync::Arc;

use async_trait::async_trait;
use factory_core::{ProviderSystem, RunMetadata};
use providers::VoiceAgentProvider;

use super::{missing, verdict_for_error, StepVerifier, Verdict};

/// Ready once a synthetic probe to the agent produces any output.
pub struct VoiceAgentVerifier {
    voice: Arc<dyn VoiceAgentProvider>,
    probe_message: String,
}

impl VoiceAgentVerifier {
    pub fn new(voice: Arc<dyn VoiceAgentProvider>, probe_message: impl Into<String>) -> Self {
        Self {
            voice,
            probe_message: probe_message.into(),
        }
    }
}

#[async_trait]
impl StepVerifier for VoiceAgentVerifier {
    fn system(&self) -> ProviderSystem {
        ProviderSystem::Eleven
    }

    async fn verify(&self, metadata: &RunMetadata) -> Verdict {
        let Some(agent_id) = metadata.eleven().agent_id else {
            return missing("eleven.agentId");
        };

        if let Err(e) = self.voice.signed_session_url(&agent_id).await {
            return verdict_for_error(&e);
        }

        match self.voice.probe(&agent_id, &self.probe_message).await {
            Ok(reply) if !reply.trim().is_empty() => Verdict::advance(),
            Ok(_) => Verdict::Wait(format!("agent {} returned an empty reply", agent_id)),
            Err(e) => verdict_for_error(&e),
        }
    }
}
