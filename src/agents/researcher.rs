//! Researcher: runs the plan's queries one at a time and gathers context,
//! sources and raw results.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{cancelled, StageAgent, StageContext, MAX_UNIQUE_SOURCES};
use crate::error::{PipelineError, ProviderError, StageFailure};
use crate::events::{AgentEvent, AgentEventKind};
use crate::search::WebSearch;
use crate::state::{PipelineState, SearchResult};
use crate::workflow::WorkflowPhase;

const AGENT: &str = "Researcher";

/// Plan entries with repeats removed, first occurrence kept.
pub fn unique_queries(plan: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    plan.iter()
        .filter(|q| seen.insert(q.as_str()))
        .cloned()
        .collect()
}

pub struct Researcher {
    search: Arc<dyn WebSearch>,
}

impl Researcher {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl StageAgent for Researcher {
    fn name(&self) -> &str {
        AGENT
    }

    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Researching
    }

    async fn execute(
        &self,
        state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError> {
        ctx.emit(AgentEvent::action(AGENT, "Executing web search..."));

        // Accumulate on the side; a failed query discards all of it.
        let mut new_context = Vec::new();
        let mut sources = state.sources.clone();
        let mut seen: HashSet<String> = sources.iter().map(|s| s.uri.clone()).collect();
        let mut raw_results: Vec<SearchResult> = state.raw_search_results.clone().unwrap_or_default();

        for query in unique_queries(&state.plan) {
            let query = query.as_str();
            ctx.emit(
                AgentEvent::new(AgentEventKind::Search, format!("Searching: {query}")).with_agent(AGENT),
            );

            let result = match ctx.guard(self.search.search(query)).await {
                Ok(result) => result,
                Err(ProviderError::Cancelled) => return Err(cancelled(self.phase())),
                Err(e) => {
                    ctx.report_failure(&StageFailure::Research(e.to_string()));
                    return Ok(state);
                }
            };

            if !result.text.is_empty() {
                new_context.push(result.text.clone());
            }

            for source in &result.sources {
                if sources.len() >= MAX_UNIQUE_SOURCES {
                    break;
                }
                if seen.insert(source.uri.clone()) {
                    sources.push(source.clone());
                }
            }

            raw_results.push(result);

            if sources.len() >= MAX_UNIQUE_SOURCES {
                debug!(query = %query, "Source cap reached, skipping remaining queries");
                break;
            }
        }

        info!(contexts = new_context.len(), sources = sources.len(), "Web search completed");
        ctx.emit(AgentEvent::action(
            AGENT,
            format!("Web search completed. Found {} new contexts.", new_context.len()),
        ));

        let mut state = state;
        state.context.extend(new_context);
        state.sources = sources;
        state.raw_search_results = Some(raw_results);
        Ok(state)
    }
}
