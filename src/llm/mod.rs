//! Text-generation capability and its providers.
//!
//! Provider priority is Gemini, Groq, Hugging Face, then a local Ollama
//! model. Only providers with credentials (or, for Ollama, a model name) in
//! the [`Config`] join the chain.

pub mod chain;
pub mod gemini;
pub mod groq;
pub mod huggingface;
pub mod ollama;
pub mod provider;

use std::sync::Arc;

use tracing::info;

pub use chain::FallbackTextGeneration;
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use huggingface::HuggingFaceProvider;
pub use ollama::OllamaProvider;
pub use provider::{GenerationRequest, TextGeneration, TextStream};

use crate::config::Config;

/// Build the prioritised text-generation chain from configuration.
pub fn build_text_generation(config: &Config) -> FallbackTextGeneration {
    let timeout = config.request_timeout();
    let mut providers: Vec<Arc<dyn TextGeneration>> = Vec::new();

    if let Some(key) = &config.google_api_key {
        providers.push(Arc::new(GeminiProvider::new(key, &config.gemini_model, timeout)));
    }
    if let Some(key) = &config.groq_api_key {
        providers.push(Arc::new(GroqProvider::new(key, &config.groq_model, timeout)));
    }
    if let Some(key) = &config.huggingface_api_key {
        providers.push(Arc::new(HuggingFaceProvider::new(key, timeout)));
    }
    if let Some(model) = &config.ollama_model {
        providers.push(Arc::new(OllamaProvider::new(&config.ollama_host, model)));
    }

    let chain = FallbackTextGeneration::new(providers);
    info!(providers = ?chain.provider_names(), "Text generation chain ready");
    chain
}
