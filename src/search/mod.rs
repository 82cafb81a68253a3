//! Web-search capability and its providers.
//!
//! Provider priority is Gemini grounded search, Tavily, then DuckDuckGo,
//! which needs no key and is always present. Image augmentation sources
//! join only when configured.

pub mod chain;
pub mod duckduckgo;
pub mod gemini;
pub mod images;
pub mod provider;
pub mod tavily;

use std::sync::Arc;

use tracing::info;

pub use chain::FallbackSearch;
pub use duckduckgo::DuckDuckGoSearch;
pub use gemini::GeminiSearch;
pub use images::ImageAugmenter;
pub use provider::WebSearch;
pub use tavily::{SearchDepth, TavilySearch};

use crate::config::Config;
use crate::llm::GeminiProvider;

const DUCKDUCKGO_MAX_RESULTS: usize = 10;

/// Build the prioritised web-search chain from configuration.
pub fn build_web_search(config: &Config) -> FallbackSearch {
    let timeout = config.request_timeout();
    let mut providers: Vec<Arc<dyn WebSearch>> = Vec::new();

    if let Some(key) = &config.google_api_key {
        let gemini = GeminiProvider::new(key, &config.gemini_model, timeout);
        providers.push(Arc::new(GeminiSearch::new(Arc::new(gemini))));
    }
    if let Some(key) = &config.tavily_api_key {
        providers.push(Arc::new(TavilySearch::new(key, timeout)));
    }
    providers.push(Arc::new(DuckDuckGoSearch::new(DUCKDUCKGO_MAX_RESULTS, timeout)));

    let mut augmenter = ImageAugmenter::new(timeout);
    if config.api_url.is_some() {
        augmenter = augmenter.with_proxy(config.backend_url("api/duckduckgo/images"));
    }
    if let Some(key) = &config.pexels_api_key {
        augmenter = augmenter.with_pexels(key, None);
    }
    if let Some(key) = &config.unsplash_access_key {
        augmenter = augmenter.with_unsplash(key, None);
    }

    let chain = FallbackSearch::new(providers).with_augmenter(augmenter);
    info!(providers = ?chain.provider_names(), "Web search chain ready");
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duckduckgo_always_last() {
        let chain = build_web_search(&Config::default());
        assert_eq!(chain.provider_names(), vec!["DuckDuckGo"]);

        let config = Config {
            google_api_key: Some("g".to_string()),
            tavily_api_key: Some("t".to_string()),
            ..Config::default()
        };
        assert_eq!(
            build_web_search(&config).provider_names(),
            vec!["Gemini Search", "Tavily", "DuckDuckGo"]
        );
    }
}
