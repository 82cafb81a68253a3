//! Research workflow orchestrator
//!
//! Runs the six stages strictly in order:
//!
//! ```text
//! idle → planning → researching → extracting_images → validating_sources
//!      → writing → publishing → done
//! ```
//!
//! Stages absorb their own provider failures, so a normal run always ends
//! with one `complete` event. `failed` is only reached when a stage panics
//! or returns an error past its own guard; the run then ends with one
//! `error` event and an `Err` to the caller.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agents::{
    ImageExtractor, Planner, Publisher, Researcher, SourceValidator, StageAgent, StageContext, Writer,
};
use crate::config::Config;
use crate::error::PipelineError;
use crate::events::{AgentEvent, EventBus, Subscription};
use crate::llm::{build_text_generation, TextGeneration};
use crate::search::{build_web_search, WebSearch};
use crate::state::PipelineState;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Planning,
    Researching,
    ExtractingImages,
    ValidatingSources,
    Writing,
    Publishing,
    Done,
    Failed,
}

impl WorkflowPhase {
    /// The phase that follows on success. `Done` and `Failed` are absorbing.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Planning,
            Self::Planning => Self::Researching,
            Self::Researching => Self::ExtractingImages,
            Self::ExtractingImages => Self::ValidatingSources,
            Self::ValidatingSources => Self::Writing,
            Self::Writing => Self::Publishing,
            Self::Publishing => Self::Done,
            Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Researching => "researching",
            Self::ExtractingImages => "extracting_images",
            Self::ValidatingSources => "validating_sources",
            Self::Writing => "writing",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PRE-FLIGHT
// =============================================================================

/// Informational availability check run before each pipeline.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// GETs the backend's `/health` endpoint.
pub struct HttpHealthProbe {
    url: String,
    client: Client,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            url: url.into(),
            client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backend_url("health"), HEALTH_TIMEOUT)
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %self.url, error = %e, "Health check request failed");
                false
            }
        }
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Runs research pipelines and fans their events out to subscribers.
///
/// Runs started concurrently on one workflow are independent; they share
/// only the subscriber list.
pub struct ResearchWorkflow {
    stages: Vec<Arc<dyn StageAgent>>,
    events: EventBus,
    health: Option<Arc<dyn HealthProbe>>,
}

impl ResearchWorkflow {
    /// The standard six-stage pipeline over the given capabilities.
    pub fn new(llm: Arc<dyn TextGeneration>, search: Arc<dyn WebSearch>) -> Self {
        Self::from_stages(vec![
            Arc::new(Planner::new(Arc::clone(&llm))) as Arc<dyn StageAgent>,
            Arc::new(Researcher::new(search)),
            Arc::new(ImageExtractor::new()),
            Arc::new(SourceValidator::new()),
            Arc::new(Writer::new(llm)),
            Arc::new(Publisher::new()),
        ])
    }

    /// Wire providers, fallback chains and the backend probe from `config`.
    pub fn from_config(config: &Config) -> Self {
        let llm: Arc<dyn TextGeneration> = Arc::new(build_text_generation(config));
        let search: Arc<dyn WebSearch> = Arc::new(build_web_search(config));

        Self::new(llm, search).with_health_probe(Arc::new(HttpHealthProbe::from_config(config)))
    }

    /// A pipeline over custom stages, run in the order given.
    pub fn from_stages(stages: Vec<Arc<dyn StageAgent>>) -> Self {
        Self {
            stages,
            events: EventBus::new(),
            health: None,
        }
    }

    pub fn with_health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.health = Some(probe);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Run the pipeline to completion.
    pub async fn start(
        &self,
        topic: impl Into<String>,
        is_deep: bool,
    ) -> Result<PipelineState, PipelineError> {
        self.start_with_cancellation(topic, is_deep, CancellationToken::new())
            .await
    }

    /// Run the pipeline, stopping early once `cancel` fires.
    pub async fn start_with_cancellation(
        &self,
        topic: impl Into<String>,
        is_deep: bool,
        cancel: CancellationToken,
    ) -> Result<PipelineState, PipelineError> {
        let topic = topic.into();

        if let Some(probe) = &self.health {
            if probe.check().await {
                info!("Backend reachable");
            } else {
                warn!("Backend health check failed, continuing with direct providers");
            }
        }

        let ctx = StageContext::new(self.events.clone(), cancel);
        let mut state = PipelineState::new(topic, is_deep);

        info!(topic = %state.topic, mode = state.mode_label(), "Starting research pipeline");
        self.events.emit(AgentEvent::log(format!(
            "Starting {} Research on: {}",
            state.mode_label(),
            state.topic
        )));

        let mut phase = WorkflowPhase::Idle;
        for stage in &self.stages {
            phase = phase.next();
            debug!(phase = %phase, agent = stage.name(), "Entering stage");

            if ctx.is_cancelled() {
                return Err(self.abort(PipelineError::Cancelled { phase }));
            }

            let outcome = AssertUnwindSafe(stage.execute(state, &ctx))
                .catch_unwind()
                .await;

            state = match outcome {
                Ok(Ok(next)) => next,
                Ok(Err(e)) => return Err(self.abort(e)),
                Err(panic) => {
                    return Err(self.abort(PipelineError::StageCrashed {
                        phase,
                        message: panic_message(panic.as_ref()),
                    }))
                }
            };
        }

        info!(
            sources = state.sources.len(),
            images = state.images.len(),
            "Research pipeline completed"
        );
        self.events
            .emit(AgentEvent::log("Research Pipeline Completed Successfully"));
        Ok(state)
    }

    /// Emit the terminal error event for a failed run.
    fn abort(&self, err: PipelineError) -> PipelineError {
        let message = match &err {
            PipelineError::StageCrashed { message, .. } => format!("Pipeline crashed: {message}"),
            PipelineError::Cancelled { .. } => err.to_string(),
        };
        error!(error = %err, "Research pipeline aborted");
        self.events.emit(AgentEvent::error(message));
        err
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".to_string()
    }
}
