//! Source validator (SourceProcessor): deduplicates sources by `uri`.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::json;

use super::{StageAgent, StageContext};
use crate::error::PipelineError;
use crate::events::{AgentEvent, AgentEventKind};
use crate::state::{PipelineState, Source};
use crate::workflow::WorkflowPhase;

const AGENT: &str = "SourceProcessor";

/// First occurrence of each `uri` wins, order kept.
pub fn dedup_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|source| seen.insert(source.uri.clone()))
        .collect()
}

#[derive(Default)]
pub struct SourceValidator;

impl SourceValidator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageAgent for SourceValidator {
    fn name(&self) -> &str {
        AGENT
    }

    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::ValidatingSources
    }

    async fn execute(
        &self,
        mut state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError> {
        if !state.is_deep {
            ctx.emit(AgentEvent::action(
                AGENT,
                "Minimal source processing for quick research to optimize token usage",
            ));
            state.sources = dedup_sources(state.sources);
            return Ok(state);
        }

        ctx.emit(AgentEvent::action(AGENT, "Validating and enriching sources..."));

        // Enrichment (page titles, reachability) is not done; sources pass through.
        let sources = dedup_sources(std::mem::take(&mut state.sources));

        ctx.emit(
            AgentEvent::new(
                AgentEventKind::Source,
                format!("Source validation completed. Total unique sources: {}", sources.len()),
            )
            .with_agent(AGENT)
            .with_data(json!(sources)),
        );

        state.sources = sources;
        Ok(state)
    }
}
