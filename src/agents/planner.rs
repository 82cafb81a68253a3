//! Planner (Editor): turns the topic into a list of search queries.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{cancelled, StageAgent, StageContext};
use crate::error::{PipelineError, ProviderError, StageFailure};
use crate::events::{AgentEvent, AgentEventKind};
use crate::llm::{GenerationRequest, TextGeneration};
use crate::state::PipelineState;
use crate::workflow::WorkflowPhase;

const AGENT: &str = "Editor";

fn json_array_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("valid array regex"))
}

/// Number of queries to ask for.
pub fn query_count(is_deep: bool) -> usize {
    if is_deep {
        5
    } else {
        3
    }
}

fn planning_prompt(topic: &str, count: usize) -> String {
    format!(
        "Topic: \"{topic}\"\n\
         Role: You are the Research Editor. Plan the outline.\n\
         Task: Generate {count} specific, targeted search queries to cover this topic comprehensively.\n\
         Format: Return ONLY a raw JSON array of strings."
    )
}

fn as_queries(value: Value) -> Option<Vec<String>> {
    let Value::Array(items) = value else {
        return None;
    };

    Some(
        items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
    )
}

/// Resolve a model reply into queries.
///
/// Tries the fence-stripped reply as a JSON array, then the first `[...]`
/// fragment, then gives up with `[topic]`. Never returns an empty plan.
pub fn parse_plan(reply: &str, topic: &str) -> Vec<String> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let parsed = serde_json::from_str::<Value>(cleaned)
        .ok()
        .and_then(as_queries)
        .or_else(|| {
            warn!("Plan is not a JSON array, trying fragment extraction");
            json_array_regex()
                .find(cleaned)
                .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
                .and_then(as_queries)
        });

    match parsed {
        Some(queries) if !queries.is_empty() => queries,
        _ => {
            warn!(topic = %topic, "Falling back to the topic as the only query");
            vec![topic.to_string()]
        }
    }
}

pub struct Planner {
    llm: Arc<dyn TextGeneration>,
}

impl Planner {
    pub fn new(llm: Arc<dyn TextGeneration>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageAgent for Planner {
    fn name(&self) -> &str {
        AGENT
    }

    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Planning
    }

    async fn execute(
        &self,
        mut state: PipelineState,
        ctx: &StageContext,
    ) -> Result<PipelineState, PipelineError> {
        ctx.emit(AgentEvent::action(
            AGENT,
            "Analyzing request and outlining research strategy...",
        ));

        let request = GenerationRequest::new(planning_prompt(&state.topic, query_count(state.is_deep)))
            .with_system("Output JSON only.")
            .json();

        let plan = match ctx.guard(self.llm.generate(&request)).await {
            Ok(reply) => parse_plan(&reply, &state.topic),
            Err(ProviderError::Cancelled) => return Err(cancelled(self.phase())),
            Err(e) => {
                ctx.report_failure(&StageFailure::Planning(e.to_string()));
                state.plan = vec![state.topic.clone()];
                return Ok(state);
            }
        };

        info!(queries = plan.len(), "Research plan ready");
        ctx.emit(
            AgentEvent::new(
                AgentEventKind::Plan,
                format!("Research plan created with {} queries", plan.len()),
            )
            .with_agent(AGENT)
            .with_data(json!(plan)),
        );

        state.plan = plan;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_events, ScriptedLlm};

    #[test]
    fn test_parse_fenced_array() {
        let reply = "```json\n[\"a\", \"b\", \"c\"]\n```";
        assert_eq!(parse_plan(reply, "topic"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_embedded_fragment() {
        let reply = "Sure! Here are the queries: [\"x\", \"y\"] Hope this helps.";
        assert_eq!(parse_plan(reply, "topic"), vec!["x", "y"]);
    }

    #[test]
    fn test_parse_non_string_items() {
        assert_eq!(parse_plan("[1, \"two\", null]", "topic"), vec!["1", "two"]);
    }

    #[test]
    fn test_parse_garbage_falls_back_to_topic() {
        assert_eq!(parse_plan("no json here", "quantum"), vec!["quantum"]);
        assert_eq!(parse_plan("{\"queries\": 3}", "quantum"), vec!["quantum"]);
        assert_eq!(parse_plan("[", "quantum"), vec!["quantum"]);
        assert_eq!(parse_plan("[]", "quantum"), vec!["quantum"]);
    }

    #[tokio::test]
    async fn test_execute_sets_plan_and_emits() {
        let llm = Arc::new(ScriptedLlm::new().reply("[\"q1\", \"q2\", \"q3\"]"));
        let ctx = StageContext::default();
        let events = record_events(&ctx.events);

        let state = Planner::new(llm.clone())
            .execute(PipelineState::new("rust", false), &ctx)
            .await
            .unwrap();

        assert_eq!(state.plan, vec!["q1", "q2", "q3"]);

        let request = &llm.requests()[0];
        assert!(request.json_mode);
        assert!(request.prompt.contains("Generate 3 specific"));
        assert_eq!(request.system_instruction.as_deref(), Some("Output JSON only."));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, AgentEventKind::Plan);
        assert_eq!(events[1].data, Some(json!(["q1", "q2", "q3"])));
    }

    #[tokio::test]
    async fn test_deep_mode_asks_for_five() {
        let llm = Arc::new(ScriptedLlm::new().reply("[]"));
        Planner::new(llm.clone())
            .execute(PipelineState::new("rust", true), &StageContext::default())
            .await
            .unwrap();

        assert!(llm.requests()[0].prompt.contains("Generate 5 specific"));
    }

    #[tokio::test]
    async fn test_generation_error_falls_back() {
        let llm = Arc::new(ScriptedLlm::failing("quota"));
        let ctx = StageContext::default();
        let events = record_events(&ctx.events);

        let state = Planner::new(llm.clone())
            .execute(PipelineState::new("quantum", false), &ctx)
            .await
            .unwrap();

        assert_eq!(state.plan, vec!["quantum"]);
        assert_eq!(llm.calls(), 1);

        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.kind, AgentEventKind::Error);
        assert!(last.message.starts_with("Planning failed:"));
    }

    #[tokio::test]
    async fn test_cancelled_before_reply() {
        let ctx = StageContext::default();
        ctx.cancel.cancel();

        let err = Planner::new(Arc::new(ScriptedLlm::new().reply("[\"q\"]")))
            .execute(PipelineState::new("t", false), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::Cancelled { phase: WorkflowPhase::Planning });
    }
}
