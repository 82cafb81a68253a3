//! Text-generation capability
//!
//! Defines the abstraction the stage agents use to talk to a language model.
//! Concrete providers live next to this file; the agents only ever see
//! `Arc<dyn TextGeneration>`.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;

use crate::error::ProviderError;
use crate::fallback::Provider;

/// Parameters of one generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Ask the model for JSON-only output.
    pub json_mode: bool,
    /// Reasoning budget hint, honoured by providers that support it.
    pub thinking_budget: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_budget = budget;
        self
    }
}

/// A finite, non-restartable stream of text chunks.
pub struct TextStream {
    inner: Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>,
}

impl TextStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Wrap a complete response as a single-chunk stream.
    pub fn from_complete(text: String) -> Self {
        Self::new(futures::stream::once(async move { Ok(text) }))
    }

    /// Replay a list of chunks.
    pub fn from_chunks(chunks: Vec<String>) -> Self {
        Self::new(futures::stream::iter(chunks.into_iter().map(Ok)))
    }
}

impl Stream for TextStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Text-generation capability
///
/// `generate_stream` defaults to a one-chunk stream over `generate`;
/// providers with native streaming override it.
#[async_trait]
pub trait TextGeneration: Provider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ProviderError> {
        let text = self.generate(request).await?;
        Ok(TextStream::from_complete(text))
    }
}
