use std::sync::Arc;

use crate::client::{anthropic::AnthropicClient, ollama::OllamaClient, openai::OpenAiClient, LlmClient};
use crate::config::{BackendType, ClientConfig, LlmSettings};
use crate::error::Result;

/// Client factory for creating LLM clients
pub struct ClientFactory;

impl ClientFactory {
    /// Create an LLM client for `backend` from a ready configuration.
    ///
    /// Fails when the configuration lacks what the backend needs, so a
    /// misconfigured client never reaches its first call.
    pub fn create(backend: BackendType, config: ClientConfig) -> Result<Arc<dyn LlmClient>> {
        let client: Arc<dyn LlmClient> = match backend {
            BackendType::OpenAI => Arc::new(OpenAiClient::new(config)?),
            BackendType::Anthropic => Arc::new(AnthropicClient::new(config)?),
            BackendType::Ollama => Arc::new(OllamaClient::new(config)?),
        };

        log::info!("created {} client (model {})", backend, client.default_model());
        Ok(client)
    }

    /// Create an LLM client for `backend` from settings
    pub fn from_settings(backend: BackendType, settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
        Self::create(backend, settings.client_config(backend)?)
    }
}
