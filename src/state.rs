//! Pipeline state threaded through the stages.
//!
//! Each stage takes a `PipelineState` by value and returns a new one, so no
//! two stages ever hold the same snapshot.

use serde::{Deserialize, Serialize};

/// A cited web source. Identity is the exact `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// What a web search returns for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub sources: Vec<Source>,
    pub images: Vec<String>,
}

/// Working state of one research run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub topic: String,
    pub is_deep: bool,
    /// Search queries, never empty once the planner ran.
    pub plan: Vec<String>,
    /// One entry per successful query.
    pub context: Vec<String>,
    /// Unique by `uri`, insertion ordered.
    pub sources: Vec<Source>,
    /// Unique URLs, deep mode only.
    pub images: Vec<String>,
    /// Per-query results handed from the researcher to the image extractor.
    #[serde(skip)]
    pub raw_search_results: Option<Vec<SearchResult>>,
    pub report: String,
}

impl PipelineState {
    pub fn new(topic: impl Into<String>, is_deep: bool) -> Self {
        Self {
            topic: topic.into(),
            is_deep,
            ..Default::default()
        }
    }

    /// The published subset of the state.
    pub fn to_result(&self) -> PublishedResult {
        PublishedResult {
            report: self.report.clone(),
            sources: self.sources.clone(),
            images: self.images.clone(),
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.is_deep {
            "Deep"
        } else {
            "Quick"
        }
    }
}

/// Payload of the `complete` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishedResult {
    pub report: String,
    pub sources: Vec<Source>,
    pub images: Vec<String>,
}
