//! Fallback chain over several text-generation providers.

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::{GenerationRequest, TextGeneration, TextStream};
use crate::error::ProviderError;
use crate::fallback::{first_success, Provider};

const CAPABILITY: &str = "text generation";

/// Tries each provider in priority order; the first that answers wins.
///
/// For streams, fallback only covers opening the stream. Errors after the
/// first chunk belong to the stream that produced them.
pub struct FallbackTextGeneration {
    providers: Vec<Arc<dyn TextGeneration>>,
}

impl FallbackTextGeneration {
    pub fn new(providers: Vec<Arc<dyn TextGeneration>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Provider for FallbackTextGeneration {
    fn name(&self) -> &str {
        "fallback"
    }
}

#[async_trait]
impl TextGeneration for FallbackTextGeneration {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        first_success(CAPABILITY, &self.providers, |p| p.generate(request)).await
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ProviderError> {
        first_success(CAPABILITY, &self.providers, |p| p.generate_stream(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let broken = Arc::new(ScriptedLlm::failing("quota exceeded"));
        let working = Arc::new(ScriptedLlm::new().reply("ok"));
        let chain = FallbackTextGeneration::new(vec![
            broken.clone() as Arc<dyn TextGeneration>,
            working.clone(),
        ]);

        let text = chain.generate(&GenerationRequest::new("q")).await.unwrap();

        assert_eq!(text, "ok");
        assert_eq!(broken.calls(), 1);
        assert_eq!(working.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_falls_back_on_open_error() {
        let broken = Arc::new(ScriptedLlm::failing("down"));
        let working = Arc::new(ScriptedLlm::new().stream_chunks(&["a", "b"]));
        let chain = FallbackTextGeneration::new(vec![broken as Arc<dyn TextGeneration>, working]);

        let stream = chain.generate_stream(&GenerationRequest::new("q")).await.unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_chain_errors() {
        let chain = FallbackTextGeneration::new(Vec::new());
        assert!(chain.is_empty());

        let err = chain.generate(&GenerationRequest::new("q")).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoProviders(_)));
    }
}
