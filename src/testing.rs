//! Scripted capability doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::events::{AgentEvent, EventBus};
use crate::fallback::Provider;
use crate::llm::{GenerationRequest, TextGeneration, TextStream};
use crate::search::WebSearch;
use crate::state::SearchResult;

fn scripted_error(message: &str) -> ProviderError {
    ProviderError::Api {
        provider: "scripted".to_string(),
        status: 500,
        body: message.to_string(),
    }
}

/// Text generation that replays canned replies in order.
///
/// Once the replies run out `generate` returns an empty string.
#[derive(Default)]
pub(crate) struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    failure: Option<String>,
    chunks: Option<Vec<String>>,
    stream_failure: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlm {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `message`.
    pub(crate) fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn reply(self, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(text.to_string());
        self
    }

    /// `generate_stream` yields these chunks instead of a reply.
    pub(crate) fn stream_chunks(mut self, chunks: &[&str]) -> Self {
        self.chunks = Some(chunks.iter().map(|c| c.to_string()).collect());
        self
    }

    /// After the scripted chunks, the stream yields this error.
    pub(crate) fn stream_fails_with(mut self, message: &str) -> Self {
        self.stream_failure = Some(message.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &GenerationRequest) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(message) => Err(scripted_error(message)),
            None => Ok(()),
        }
    }

    fn next_reply(&self) -> String {
        self.replies.lock().unwrap().pop_front().unwrap_or_default()
    }
}

impl Provider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }
}

#[async_trait]
impl TextGeneration for ScriptedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.record(request)?;
        Ok(self.next_reply())
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TextStream, ProviderError> {
        self.record(request)?;

        let mut items: Vec<Result<String, ProviderError>> = match &self.chunks {
            Some(chunks) => chunks.iter().cloned().map(Ok).collect(),
            None => vec![Ok(self.next_reply())],
        };
        if let Some(message) = &self.stream_failure {
            items.push(Err(ProviderError::Stream {
                provider: "scripted".to_string(),
                message: message.clone(),
            }));
        }

        Ok(TextStream::new(futures::stream::iter(items)))
    }
}

/// Web search with per-query canned results and a query log.
#[derive(Default)]
pub(crate) struct ScriptedSearch {
    results: HashMap<String, SearchResult>,
    default: Option<SearchResult>,
    failure: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn with_result(mut self, query: &str, result: SearchResult) -> Self {
        self.results.insert(query.to_string(), result);
        self
    }

    /// Result for any query without a specific entry.
    pub(crate) fn default_result(mut self, result: SearchResult) -> Self {
        self.default = Some(result);
        self
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Provider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted search"
    }
}

#[async_trait]
impl WebSearch for ScriptedSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());

        if let Some(message) = &self.failure {
            return Err(scripted_error(message));
        }

        Ok(self
            .results
            .get(query)
            .or(self.default.as_ref())
            .cloned()
            .unwrap_or_default())
    }
}

/// Capture every event emitted on `bus` from now on.
pub(crate) fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<AgentEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}
