//! research-pipeline: a multi-stage research workflow
//!
//! Given a topic, the pipeline plans search queries, runs them through a
//! web-search capability, collects images, deduplicates sources, streams a
//! report from a text-generation capability and publishes the result.
//! Progress is reported as [`AgentEvent`]s on an [`EventBus`].
//!
//! Both capabilities are fallback chains over concrete providers (Gemini,
//! Groq, Hugging Face and Ollama for text; Gemini grounded search, Tavily
//! and DuckDuckGo for search), built from a [`Config`].
//!
//! ```rust,ignore
//! use research_pipeline::{Config, ResearchWorkflow};
//!
//! let config = Config::from_env()?;
//! let workflow = ResearchWorkflow::from_config(&config);
//! let _sub = workflow.subscribe(|event| println!("{}", event.message));
//!
//! let state = workflow.start("solid-state batteries", true).await?;
//! println!("{}", state.report);
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod events;
pub mod fallback;
pub mod llm;
pub mod search;
pub mod state;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use agents::{StageAgent, StageContext, MAX_UNIQUE_IMAGES, MAX_UNIQUE_SOURCES};
pub use config::Config;
pub use error::{PipelineError, ProviderError, StageFailure};
pub use events::{AgentEvent, AgentEventKind, EventBus, Subscription};
pub use fallback::{first_success, Provider};
pub use llm::{build_text_generation, FallbackTextGeneration, GenerationRequest, TextGeneration, TextStream};
pub use search::{build_web_search, FallbackSearch, ImageAugmenter, WebSearch};
pub use state::{PipelineState, PublishedResult, SearchResult, Source};
pub use workflow::{HealthProbe, HttpHealthProbe, ResearchWorkflow, WorkflowPhase};
