//! Image extractor: collects image URLs for deep research.
//!
//! Provider-supplied images from the raw search results come first, then
//! anything that looks like an image URL in the gathered context.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::info;

use super::{StageAgent, StageContext, MAX_UNIQUE_IMAGES};
use crate::error::PipelineError;
use crate::events::{AgentEvent, AgentEventKind};
use crate::state::PipelineState;
use crate::workflow::WorkflowPhase;

const AGENT: &str = "ImageExtractor";

fn image_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(https?://[^\s]+?\.(?:jpg|jpeg|png|gif|webp))(?:\?[^\s]*)?")
            .expect("valid image url regex")
    })
}

/// Image URLs mentioned in free text, query strings stripped.
pub fn image_urls_in(text: &str) -> impl Iterator<Item = &str> {
    image_url_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Accepts unique images until the cap is reached.
struct ImageSet {
    seen: HashSet<String>,
    images: Vec<String>,
}

impl ImageSet {
    fn seeded(existing: &[String]) -> Self {
        Self {
            seen: existing.iter().cloned().collect(),
            images: existing.to_vec(),
        }
    }

    fn is_full(&self) -> bool {
        self.images.len() >= MAX_UNIQUE_IMAGES
    }

    /// Returns true if `url` was new and accepted.
    fn accept(&mut self, url: &str) -> bool {
        if self.is_full() || !self.seen.insert(url.to_string()) {
            return false;
        }
        self.images.push(url.to_string());
        true
    }
}

#[derive(Default)]
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageAgent for ImageExtractor {
    fn name(&self) -> &str {
        AGENT
    }

    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::ExtractingImages
    }

    async fn execute(
        &self,
        mut state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError> {
        if !state.is_deep {
            ctx.emit(AgentEvent::action(
                AGENT,
                "Skipping image extraction for quick research to optimize token usage",
            ));
            return Ok(state);
        }

        ctx.emit(AgentEvent::action(AGENT, "Extracting visual assets..."));

        let mut set = ImageSet::seeded(&state.images);
        let before = set.images.len();

        let announce = |url: &str| {
            ctx.emit(
                AgentEvent::new(AgentEventKind::Image, "Visual asset intercepted")
                    .with_agent(AGENT)
                    .with_data(json!(url)),
            );
        };

        let provided = state
            .raw_search_results
            .iter()
            .flatten()
            .flat_map(|result| result.images.iter());
        for url in provided {
            if set.is_full() {
                break;
            }
            if set.accept(url) {
                announce(url);
            }
        }

        let context = state.context.join(" ");
        for url in image_urls_in(&context) {
            if set.is_full() {
                break;
            }
            if set.accept(url) {
                announce(url);
            }
        }

        let found = set.images.len() - before;
        info!(found, total = set.images.len(), "Image extraction completed");
        ctx.emit(AgentEvent::action(
            AGENT,
            format!("Image extraction completed. Found {found} new assets."),
        ));

        state.images = set.images;
        Ok(state)
    }
}
