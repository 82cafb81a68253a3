//! Tavily Search - web search API with answers and images
//!
//! Sends an advanced-depth search with the AI answer and image list
//! enabled, and folds the response into a [`SearchResult`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::provider::WebSearch;
use crate::error::ProviderError;
use crate::fallback::Provider;
use crate::state::{SearchResult, Source};

pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com/search";

const PROVIDER: &str = "Tavily";
const MAX_RESULTS: u32 = 10;

/// Search depth for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast search with basic results
    Basic,
    /// More thorough search with detailed results
    #[default]
    Advanced,
}

/// Typed errors for Tavily API
#[derive(Debug, thiserror::Error)]
pub enum TavilyError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Tavily API key is invalid")]
    Unauthorized,

    #[error("Tavily API rate limit exceeded")]
    RateLimited,

    #[error("Tavily API usage limit exceeded")]
    UsageLimit,

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl From<TavilyError> for ProviderError {
    fn from(e: TavilyError) -> Self {
        let provider = PROVIDER.to_string();
        match e {
            TavilyError::Timeout => ProviderError::Timeout { provider },
            TavilyError::Network(message) => ProviderError::Network { provider, message },
            TavilyError::Unauthorized => ProviderError::Unauthorized { provider },
            TavilyError::RateLimited => ProviderError::RateLimited { provider },
            TavilyError::UsageLimit => ProviderError::UsageLimit { provider },
            TavilyError::HttpError(status, body) => ProviderError::Api { provider, status, body },
            TavilyError::ParseError(message) => ProviderError::Parse { provider, message },
        }
    }
}

/// Request body for Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: SearchDepth,
    include_images: bool,
    include_answer: bool,
    max_results: u32,
}

/// Response from Tavily API
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    /// AI-generated answer (if requested)
    answer: Option<String>,

    #[serde(default)]
    results: Vec<TavilyResult>,

    #[serde(default)]
    images: Vec<String>,
}

/// Individual search result
#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyResponse {
    fn into_search_result(self) -> SearchResult {
        let mut text = self.answer.unwrap_or_default();
        let listing = self
            .results
            .iter()
            .map(|r| format!("\nTitle: {}\nContent: {}", r.title, r.content))
            .collect::<Vec<_>>()
            .join("\n");
        text.push_str(&listing);

        let sources = self
            .results
            .into_iter()
            .map(|r| Source::new(r.title, r.url))
            .collect();

        SearchResult {
            text,
            sources,
            images: self.images,
        }
    }
}

/// Tavily web search
pub struct TavilySearch {
    api_key: String,
    url: String,
    client: Client,
    depth: SearchDepth,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.into(),
            url: DEFAULT_TAVILY_URL.to_string(),
            client,
            depth: SearchDepth::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    async fn execute(&self, query: &str) -> Result<TavilyResponse, TavilyError> {
        let request = TavilyRequest {
            query,
            search_depth: self.depth,
            include_images: true,
            include_answer: true,
            max_results: MAX_RESULTS,
        };

        debug!(query = %query, url = %self.url, "Tavily request");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TavilyError::Timeout
                } else {
                    TavilyError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| TavilyError::ParseError(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(TavilyError::Unauthorized),
            429 => Err(TavilyError::RateLimited),
            432 => Err(TavilyError::UsageLimit),
            code => Err(TavilyError::HttpError(code, error_text)),
        }
    }
}

impl Provider for TavilySearch {
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        let result = self.execute(query).await?.into_search_result();
        info!(query = %query, sources = result.sources.len(), "Tavily search completed");
        Ok(result)
    }
}
