//! Local Ollama provider built on the Rig framework
//!
//! Each call builds a Rig agent with the request's system instruction as
//! its preamble and sends the prompt through Rig's `Prompt` trait.

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::ollama;
use tracing::debug;

use super::provider::{GenerationRequest, TextGeneration};
use crate::error::ProviderError;
use crate::fallback::Provider;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

const PROVIDER: &str = "Ollama";

pub struct OllamaProvider {
    host: String,
    model: String,
    client: ollama::Client,
}

impl OllamaProvider {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        let host = host.into();

        // Rig's Ollama client reads its endpoint from OLLAMA_API_BASE_URL.
        std::env::set_var("OLLAMA_API_BASE_URL", &host);
        let client = ollama::Client::from_env();

        Self {
            host,
            model: model.into(),
            client,
        }
    }
}

impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl TextGeneration for OllamaProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        debug!(host = %self.host, model = %self.model, "Ollama completion");

        let mut preamble = request.system_instruction.clone().unwrap_or_default();
        if request.json_mode {
            preamble.push_str(" Output strict JSON only.");
        }

        let agent = self
            .client
            .agent(&self.model)
            .preamble(preamble.trim())
            .build();

        agent
            .prompt(request.prompt.as_str())
            .await
            .map_err(|e| rig_error(e.to_string()))
    }
}

fn rig_error(message: String) -> ProviderError {
    ProviderError::Request {
        provider: PROVIDER.to_string(),
        message,
    }
}
