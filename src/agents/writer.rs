//! Writer: streams the final report from the gathered context.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn};

use super::{cancelled, StageAgent, StageContext};
use crate::error::{PipelineError, ProviderError, StageFailure};
use crate::events::{AgentEvent, AgentEventKind};
use crate::llm::{GenerationRequest, TextGeneration};
use crate::state::PipelineState;
use crate::workflow::WorkflowPhase;

const AGENT: &str = "Writer";

/// Reasoning budget for deep reports.
pub const DEEP_THINKING_BUDGET: u32 = 1024;

const DEEP_STRUCTURE: &str = "Task: Create a comprehensive, well-structured report with the following structure:

# Executive Summary
Provide a comprehensive executive summary with 5-6 detailed paragraphs covering different aspects of the topic.

# Introduction
Provide background and context about the topic.

# Detailed Analysis
Create 4-5 main sections with detailed analysis.

# Key Findings
Present key findings as bullet points.

# Conclusions and Recommendations
Summarize conclusions and provide actionable recommendations.

Use proper Markdown formatting with headings and lists.";

const QUICK_STRUCTURE: &str = "Task: Create a comprehensive overview report with the following structure:

# Executive Summary
Provide a comprehensive executive summary with 3-5 detailed paragraphs covering different aspects of the topic.

# Key Aspects
Cover the most important aspects of the topic.

# Analysis and Insights
Provide critical analysis with supporting evidence.

# Key Findings
Present key findings as bullet points.

# Conclusions and Recommendations
Summarize conclusions and provide recommendations.

Use proper Markdown formatting with headings and lists.";

/// Build the drafting request for `state`.
pub fn drafting_request(state: &PipelineState) -> GenerationRequest {
    let (role, length, structure) = if state.is_deep {
        (
            "Chief Technical Writer",
            "Create a comprehensive, well-structured report with detailed analysis and multiple sections. \
             Aim for 2500+ words with proper headings, subheadings, and organized content, \
             emphasizing a detailed executive summary with 5-6 paragraphs.",
            DEEP_STRUCTURE,
        )
    } else {
        (
            "Briefing Specialist",
            "Create a comprehensive overview report with key points and essential insights. \
             Aim for 1500-2000 words with proper structure, \
             emphasizing a detailed executive summary with 3-5 paragraphs.",
            QUICK_STRUCTURE,
        )
    };

    let prompt = format!(
        "Topic: {topic}\n\nContext Data:\n{context}\n\n{structure}\n\nEnsure the report is professionally formatted and comprehensive.",
        topic = state.topic,
        context = state.context.join("\n\n"),
    );

    let system = format!(
        "You are the {role}. Structure the report professionally. {length} \
         Focus only on information that will be displayed in the UI. \
         Create a well-organized, comprehensive report with proper headings, subheadings, and lists. \
         Avoid unnecessary elaboration."
    );

    GenerationRequest::new(prompt)
        .with_system(system)
        .with_thinking_budget(state.is_deep.then_some(DEEP_THINKING_BUDGET))
}

/// Report text shown in place of a report that could not be drafted.
pub fn failure_report(detail: &str) -> String {
    format!("**Report Generation Failed**\n\nError: {detail}\n\nPlease check API keys and try again.")
}

pub struct Writer {
    llm: Arc<dyn TextGeneration>,
}

impl Writer {
    pub fn new(llm: Arc<dyn TextGeneration>) -> Self {
        Self { llm }
    }

    fn failed(&self, mut state: PipelineState, ctx: &StageContext, error: ProviderError) -> PipelineState {
        let detail = error.to_string();
        warn!(error = %detail, "Report drafting failed");
        ctx.report_failure(&StageFailure::Drafting(detail.clone()));
        state.report = failure_report(&detail);
        state
    }
}

#[async_trait]
impl StageAgent for Writer {
    fn name(&self) -> &str {
        AGENT
    }

    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Writing
    }

    async fn execute(
        &self,
        mut state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError> {
        ctx.emit(AgentEvent::action(AGENT, "Drafting final report..."));

        let request = drafting_request(&state);
        let mut stream = match ctx.guard(self.llm.generate_stream(&request)).await {
            Ok(stream) => stream,
            Err(ProviderError::Cancelled) => return Err(cancelled(self.phase())),
            Err(e) => return Ok(self.failed(state, ctx, e)),
        };

        let mut report = String::new();
        loop {
            match ctx.guard(async { stream.next().await.transpose() }).await {
                Ok(Some(chunk)) => {
                    report.push_str(&chunk);
                    ctx.emit(
                        AgentEvent::new(AgentEventKind::ReportChunk, "typing...")
                            .with_agent(AGENT)
                            .with_data(json!(chunk)),
                    );
                }
                Ok(None) => break,
                Err(ProviderError::Cancelled) => return Err(cancelled(self.phase())),
                Err(e) => return Ok(self.failed(state, ctx, e)),
            }
        }

        info!(chars = report.len(), "Report drafted");
        ctx.emit(AgentEvent::action(AGENT, "Report drafting complete."));

        state.report = report;
        Ok(state)
    }
}
