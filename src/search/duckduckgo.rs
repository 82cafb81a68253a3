//! DuckDuckGo search (keyless last resort)
//!
//! DuckDuckGo has no free JSON web-search API, so this scrapes the HTML
//! endpoint. Results carry links and domains only; there are no images.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::provider::WebSearch;
use crate::error::ProviderError;
use crate::fallback::Provider;
use crate::state::{SearchResult, Source};

pub const DEFAULT_DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";

const PROVIDER: &str = "DuckDuckGo";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct DuckDuckGoSearch {
    url: String,
    max_results: usize,
    /// Courtesy pause before each request
    delay: Duration,
    client: Client,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            url: DEFAULT_DUCKDUCKGO_URL.to_string(),
            max_results,
            delay: Duration::from_millis(500),
            client,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Parse DuckDuckGo HTML to extract result links.
    /// Uses multiple strategies to handle different HTML formats.
    fn parse_html(&self, html: &str) -> Vec<Source> {
        let mut results = Vec::new();
        let mut seen_urls = HashSet::new();

        let mut accept = |url: String, results: &mut Vec<Source>| {
            if !url.contains("duckduckgo.com") && seen_urls.insert(url.clone()) {
                let title = extract_domain(&url).unwrap_or_else(|| "Result".to_string());
                results.push(Source::new(title, url));
            }
        };

        // Strategy 1: redirect links carry the target in the uddg parameter
        for segment in html.split("uddg=").skip(1) {
            if results.len() >= self.max_results {
                break;
            }

            if let Some(end) = segment.find(|c: char| matches!(c, '&' | '"' | '\'')) {
                if let Ok(url) = urlencoding::decode(&segment[..end]) {
                    if url.starts_with("http") {
                        accept(url.into_owned(), &mut results);
                    }
                }
            }
        }

        // Strategy 2: the visible result__url anchors
        if results.len() < self.max_results {
            for segment in html.split("result__url").skip(1) {
                if results.len() >= self.max_results {
                    break;
                }

                let Some(href_start) = segment.find("href=\"") else {
                    continue;
                };
                let after_href = &segment[href_start + 6..];
                let Some(href_end) = after_href.find('"') else {
                    continue;
                };

                let href = &after_href[..href_end];
                let url = if let Some(rest) = href.strip_prefix("//") {
                    format!("https://{rest}")
                } else if href.starts_with("http") {
                    href.to_string()
                } else {
                    continue;
                };
                accept(url, &mut results);
            }
        }

        results.truncate(self.max_results);
        results
    }
}

/// Extract the domain name from a URL.
fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .filter(|d| !d.is_empty())
        .map(|s| s.to_string())
}

impl Provider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let url = format!("{}?q={}", self.url, urlencoding::encode(query));
        debug!(url = %url, "Fetching search results");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(PROVIDER, status.as_u16(), format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        let sources = self.parse_html(&body);

        if sources.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = sources.len(), "DuckDuckGo search completed");
        }

        let text = sources
            .iter()
            .map(|s| format!("\nTitle: {}\nContent: {}", s.title, s.uri))
            .collect::<String>();

        Ok(SearchResult {
            text,
            sources,
            images: Vec::new(),
        })
    }
}
