//! Error types
//!
//! Three layers, from the outside in:
//! - [`ProviderError`]: a capability provider (LLM or search) failed a call.
//! - [`StageFailure`]: a stage agent caught a failure and degraded. Its
//!   `Display` text is what observers see in the `error` event.
//! - [`PipelineError`]: something escaped every stage guard and the run aborted.

use thiserror::Error;

use crate::workflow::WorkflowPhase;

/// Failure of a single capability call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{0} API key is not configured")]
    MissingKey(String),

    #[error("No providers configured for {0}")]
    NoProviders(String),

    #[error("{provider} request timed out")]
    Timeout { provider: String },

    #[error("{provider} network error: {message}")]
    Network { provider: String, message: String },

    #[error("{provider} API key is invalid")]
    Unauthorized { provider: String },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("{provider} usage limit exceeded")]
    UsageLimit { provider: String },

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unreadable response: {message}")]
    Parse { provider: String, message: String },

    #[error("{provider} stream failed: {message}")]
    Stream { provider: String, message: String },

    /// Failure reported by a client library with no HTTP status attached.
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Classify a transport-level reqwest failure.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
            }
        } else if err.is_decode() {
            ProviderError::Parse {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Network {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Map a non-success HTTP status to the closest variant.
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        let provider = provider.to_string();
        match status {
            401 | 403 => ProviderError::Unauthorized { provider },
            429 => ProviderError::RateLimited { provider },
            _ => ProviderError::Api {
                provider,
                status,
                body,
            },
        }
    }
}

/// A stage-level failure that the stage absorbed (fail-open).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageFailure {
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Research failed: {0}")]
    Research(String),

    /// Part of the taxonomy only. Image extraction works on in-memory text
    /// and has no fallible step, so the stage never reports it.
    #[error("Image extraction failed: {0}")]
    ImageExtraction(String),

    /// Part of the taxonomy only. Source deduplication cannot fail.
    #[error("Source processing failed: {0}")]
    SourceValidation(String),

    #[error("Drafting failed: {0}")]
    Drafting(String),
}

/// A failure that escaped a stage and aborted the pipeline run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Pipeline crashed during {phase}: {message}")]
    StageCrashed {
        phase: WorkflowPhase,
        message: String,
    },

    #[error("Pipeline cancelled during {phase}")]
    Cancelled { phase: WorkflowPhase },
}
