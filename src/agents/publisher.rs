//! Publisher: announces the finished result.

use async_trait::async_trait;
use tracing::warn;

use super::{StageAgent, StageContext};
use crate::error::PipelineError;
use crate::events::{AgentEvent, AgentEventKind};
use crate::state::PipelineState;
use crate::workflow::WorkflowPhase;

const AGENT: &str = "Publisher";

#[derive(Default)]
pub struct Publisher;

impl Publisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageAgent for Publisher {
    fn name(&self) -> &str {
        AGENT
    }

    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Publishing
    }

    async fn execute(
        &self,
        state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError> {
        ctx.emit(AgentEvent::action(AGENT, "Finalizing formatting and publishing..."));

        let mut complete = AgentEvent::new(AgentEventKind::Complete, "Research Published");
        match serde_json::to_value(state.to_result()) {
            Ok(payload) => complete = complete.with_data(payload),
            Err(e) => warn!(error = %e, "Could not serialize published result"),
        }
        ctx.emit(complete);

        Ok(state)
    }
}
