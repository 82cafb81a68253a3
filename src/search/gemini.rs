//! Grounded web search through Gemini's built-in Google Search tool.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::info;

use super::provider::WebSearch;
use crate::error::ProviderError;
use crate::fallback::Provider;
use crate::llm::gemini::{GenerateContentResponse, GeminiProvider};
use crate::llm::GenerationRequest;
use crate::state::{SearchResult, Source};

fn markdown_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("valid markdown image regex"))
}

fn search_prompt(query: &str) -> String {
    format!(
        r#"You are a search engine. Perform a comprehensive real-time Google Search for: "{query}".

1. Provide a very detailed summary of the findings, prioritizing data, statistics, and concrete facts.
2. IMPORTANT: If you find relevant images in the search results, you MUST embed them in the text using Markdown format: ![alt text](url).
3. Try to include at least 3 relevant images if possible."#
    )
}

/// Pull `![alt](http...)` image links out of markdown text.
pub(crate) fn markdown_images(text: &str) -> Vec<String> {
    markdown_image_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| url.starts_with("http"))
        .collect()
}

fn into_search_result(response: GenerateContentResponse) -> SearchResult {
    let text = response.text();

    let sources = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.grounding_metadata)
        .map(|meta| {
            meta.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| {
                    let uri = web.uri?;
                    let title = web.title.unwrap_or_else(|| uri.clone());
                    Some(Source::new(title, uri))
                })
                .collect()
        })
        .unwrap_or_default();

    let images = markdown_images(&text);
    SearchResult { text, sources, images }
}

pub struct GeminiSearch {
    gemini: Arc<GeminiProvider>,
}

impl GeminiSearch {
    pub fn new(gemini: Arc<GeminiProvider>) -> Self {
        Self { gemini }
    }
}

impl Provider for GeminiSearch {
    fn name(&self) -> &str {
        "Gemini Search"
    }
}

#[async_trait]
impl WebSearch for GeminiSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        let request = GenerationRequest::new(search_prompt(query)).with_thinking_budget(Some(0));
        let mut body = GeminiProvider::request_body(&request);
        body["tools"] = json!([{ "google_search": {} }]);

        let response = self.gemini.generate_content(&body).await?;
        let result = into_search_result(response);

        info!(
            query = %query,
            sources = result.sources.len(),
            images = result.images.len(),
            "Gemini grounded search completed"
        );
        Ok(result)
    }
}
