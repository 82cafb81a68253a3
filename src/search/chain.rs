//! Fallback chain over several web-search providers.

use std::sync::Arc;

use async_trait::async_trait;

use super::images::ImageAugmenter;
use super::provider::WebSearch;
use crate::error::ProviderError;
use crate::fallback::{first_success, Provider};
use crate::state::SearchResult;

const CAPABILITY: &str = "web search";

/// Tries each search provider in priority order, then tops up the winner's
/// images through the optional [`ImageAugmenter`].
pub struct FallbackSearch {
    providers: Vec<Arc<dyn WebSearch>>,
    augmenter: Option<ImageAugmenter>,
}

impl FallbackSearch {
    pub fn new(providers: Vec<Arc<dyn WebSearch>>) -> Self {
        Self {
            providers,
            augmenter: None,
        }
    }

    pub fn with_augmenter(mut self, augmenter: ImageAugmenter) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Provider for FallbackSearch {
    fn name(&self) -> &str {
        "fallback"
    }
}

#[async_trait]
impl WebSearch for FallbackSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        let mut result = first_success(CAPABILITY, &self.providers, |p| p.search(query)).await?;

        if let Some(augmenter) = &self.augmenter {
            let images = std::mem::take(&mut result.images);
            result.images = augmenter.augment(query, images).await;
        }

        Ok(result)
    }
}
