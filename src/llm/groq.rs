//! Groq provider (OpenAI-compatible chat completions)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::provider::{GenerationRequest, TextGeneration};
use crate::error::ProviderError;
use crate::fallback::Provider;

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

const PROVIDER: &str = "Groq";
const DEFAULT_SYSTEM: &str = "You are a helpful research assistant.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct GroqProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GroqProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut system = request
            .system_instruction
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM.to_string());
        if request.json_mode {
            system.push_str(" You must output valid JSON only.");
        }

        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": 0.5,
        });
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

impl Provider for GroqProvider {
    fn name(&self) -> &str {
        PROVIDER
    }
}

// Streaming uses the trait default: one chunk with the full completion.
#[async_trait]
impl TextGeneration for GroqProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        debug!(model = %self.model, "Groq chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER, status.as_u16(), text));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| ProviderError::Parse {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}
