//! Stage agents
//!
//! Six stages run in a fixed order, each turning one [`PipelineState`] into
//! the next:
//!
//! | Stage | Agent name | Produces |
//! |-------|------------|----------|
//! | [`Planner`] | Editor | `plan` |
//! | [`Researcher`] | Researcher | `context`, `sources`, raw results |
//! | [`ImageExtractor`] | ImageExtractor | `images` (deep only) |
//! | [`SourceValidator`] | SourceProcessor | deduplicated `sources` |
//! | [`Writer`] | Writer | `report` (streamed) |
//! | [`Publisher`] | Publisher | the `complete` event |
//!
//! Stages are fail-open: provider failures become an `error` event plus a
//! degraded state. The only `Err` a stage returns is cancellation.

pub mod image_extractor;
pub mod planner;
pub mod publisher;
pub mod researcher;
pub mod source_validator;
pub mod writer;

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use image_extractor::ImageExtractor;
pub use planner::Planner;
pub use publisher::Publisher;
pub use researcher::Researcher;
pub use source_validator::SourceValidator;
pub use writer::Writer;

use crate::error::{PipelineError, ProviderError, StageFailure};
use crate::events::{AgentEvent, EventBus};
use crate::state::PipelineState;
use crate::workflow::WorkflowPhase;

/// Upper bound on unique sources gathered during research.
pub const MAX_UNIQUE_SOURCES: usize = 10;

/// Upper bound on unique images on the state.
pub const MAX_UNIQUE_IMAGES: usize = 10;

/// What every stage gets besides the state: the event channel and the
/// run's cancellation token.
#[derive(Clone, Default)]
pub struct StageContext {
    pub events: EventBus,
    pub cancel: CancellationToken,
}

impl StageContext {
    pub fn new(events: EventBus, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    pub fn emit(&self, event: AgentEvent) {
        self.events.emit(event);
    }

    /// Emit the `error` event for an absorbed stage failure.
    pub fn report_failure(&self, failure: &StageFailure) {
        self.events.emit(AgentEvent::error(failure.to_string()));
    }

    /// Race a provider call against cancellation.
    pub async fn guard<F, T>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            result = call => result,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One pipeline stage.
#[async_trait]
pub trait StageAgent: Send + Sync {
    /// Agent name shown on events.
    fn name(&self) -> &str;

    /// Workflow phase this stage runs in.
    fn phase(&self) -> WorkflowPhase;

    async fn execute(
        &self,
        state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError>;
}

/// Turn a provider cancellation into the stage's cancellation error.
pub(crate) fn cancelled(phase: WorkflowPhase) -> PipelineError {
    PipelineError::Cancelled { phase }
}
