use async_trait::async_trait;
use factory_core::ProviderSystem;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{build_client, require, send_json, DEFAULT_TIMEOUT};
use crate::traits::VoiceAgentProvider;
use crate::types::VoiceAgent;

const SYSTEM: ProviderSystem = ProviderSystem::Eleven;

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub voice_id: Option<String>,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            voice_id: None,
        }
    }
}

impl ElevenLabsConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("ELEVENLABS_API_KEY").ok(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentSummary {
    agent_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AgentList {
    #[serde(default)]
    agents: Vec<AgentSummary>,
}

#[derive(Debug, Deserialize)]
struct CreatedAgent {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct Turn {
    role: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Simulation {
    #[serde(default)]
    simulated_conversation: Vec<Turn>,
}

pub struct ElevenLabsClient {
    client: Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            config,
        }
    }

    pub fn with_client(config: ElevenLabsConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let key = require(SYSTEM, &self.config.api_key, "ELEVENLABS_API_KEY")?;
        Ok(request.header("xi-api-key", key))
    }
}

#[async_trait]
impl VoiceAgentProvider for ElevenLabsClient {
    async fn create_or_fetch_agent(&self, name: &str) -> Result<VoiceAgent> {
        let list: AgentList = send_json(
            SYSTEM,
            self.authorized(self.client.get(self.url("/v1/convai/agents")))?
                .query(&[("search", name)]),
        )
        .await?;

        if let Some(existing) = list.agents.into_iter().find(|a| a.name == name) {
            debug!(agent_id = %existing.agent_id, "Reusing existing voice agent");
            return Ok(VoiceAgent {
                agent_id: existing.agent_id,
                name: existing.name,
            });
        }

        let mut conversation_config = json!({ "agent": { "language": "en" } });
        if let Some(voice_id) = &self.config.voice_id {
            conversation_config["tts"] = json!({ "voice_id": voice_id });
        }

        info!(name = %name, "Creating voice agent");
        let created: CreatedAgent = send_json(
            SYSTEM,
            self.authorized(self.client.post(self.url("/v1/convai/agents/create")))?
                .json(&json!({
                    "name": name,
                    "conversation_config": conversation_config,
                })),
        )
        .await?;

        Ok(VoiceAgent {
            agent_id: created.agent_id,
            name: name.to_string(),
        })
    }

    async fn signed_session_url(&self, agent_id: &str) -> Result<String> {
        let signed: SignedUrl = send_json(
            SYSTEM,
            self.authorized(
                self.client
                    .get(self.url("/v1/convai/conversation/get-signed-url")),
            )?
            .query(&[("agent_id", agent_id)]),
        )
        .await?;

        Ok(signed.signed_url)
    }

    async fn probe(&self, agent_id: &str, message: &str) -> Result<String> {
        let simulation: Simulation = send_json(
            SYSTEM,
            self.authorized(self.client.post(self.url(&format!(
                "/v1/convai/agents/{}/simulate-conversation",
                agent_id
            ))))?
            .json(&json!({
                "simulation_specification": {
                    "simulated_user_config": { "first_message": message }
                },
                "new_turns_limit": 1,
            })),
        )
        .await?;

        Ok(agent_reply(&simulation))
    }
}

fn agent_reply(simulation: &Simulation) -> String {
    simulation
        .simulated_conversation
        .iter()
        .filter(|turn| turn.role == "agent")
        .filter_map(|turn| turn.message.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}
