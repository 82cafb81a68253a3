//! Hugging Face inference API provider (last hosted fallback)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{GenerationRequest, TextGeneration, TextStream};
use crate::error::ProviderError;
use crate::fallback::Provider;

pub const DEFAULT_HUGGINGFACE_URL: &str =
    "https://api-inference.huggingface.co/models/meta-llama/Meta-Llama-3-8B-Instruct";

const PROVIDER: &str = "HuggingFace";
const STREAM_CHUNK_CHARS: usize = 50;

pub struct HuggingFaceProvider {
    api_key: String,
    url: String,
    client: Client,
}

impl HuggingFaceProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.into(),
            url: DEFAULT_HUGGINGFACE_URL.to_string(),
            client,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Llama 3 chat template.
    fn format_prompt(request: &GenerationRequest) -> String {
        let system = request
            .system_instruction
            .as_deref()
            .unwrap_or("You are a helpful assistant.");
        let json_hint = if request.json_mode {
            " Output strict JSON only."
        } else {
            ""
        };

        format!(
            "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{system}{json_hint}<|eot_id|>\
             <|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>\n\n",
            request.prompt
        )
    }
}

/// The API answers with either `[{generated_text}]` or `{generated_text}`.
fn generated_text(data: &Value) -> String {
    let item = match data {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    item.and_then(|v| v.get("generated_text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

impl Provider for HuggingFaceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl TextGeneration for HuggingFaceProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "inputs": Self::format_prompt(request),
                "parameters": {
                    "max_new_tokens": 4096,
                    "return_full_text": false,
                    "temperature": 0.7,
                }
            }))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER, status.as_u16(), text));
        }

        let data: Value = response.json().await.map_err(|e| ProviderError::Parse {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

        Ok(generated_text(&data))
    }

    /// No native streaming: replay the full text in fixed-size pieces.
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ProviderError> {
        let text = self.generate(request).await?;
        Ok(TextStream::from_chunks(split_chunks(&text, STREAM_CHUNK_CHARS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_text_shapes() {
        assert_eq!(generated_text(&json!([{ "generated_text": "a" }])), "a");
        assert_eq!(generated_text(&json!({ "generated_text": "b" })), "b");
        assert_eq!(generated_text(&json!({ "error": "loading" })), "");
    }

    #[test]
    fn test_split_chunks_respects_char_boundaries() {
        let text = "é".repeat(120);
        let chunks = split_chunks(&text, STREAM_CHUNK_CHARS);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 50);
        assert_eq!(chunks[2].chars().count(), 20);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_prompt_template() {
        let prompt = HuggingFaceProvider::format_prompt(&GenerationRequest::new("Q").json());
        assert!(prompt.contains("You are a helpful assistant. Output strict JSON only."));
        assert!(prompt.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
    }
}
