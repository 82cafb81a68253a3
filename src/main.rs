//! # research-pipeline
//!
//! Command-line front end for the research workflow. Progress events go to
//! stderr, the report streams to stdout as it is written.
//!
//! ## Quick Start
//! ```bash
//! GOOGLE_API_KEY=... cargo run -- --deep "solid-state batteries"
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use research_pipeline::{AgentEvent, AgentEventKind, Config, PipelineState, ResearchWorkflow};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "research-pipeline",
    version,
    about = "Plan, search, and write a sourced research report on any topic",
    long_about = r#"
research-pipeline runs a six-stage research workflow:
  1. Plan targeted search queries
  2. Search the web (Gemini grounding, Tavily, DuckDuckGo)
  3. Extract images (deep mode)
  4. Deduplicate sources
  5. Stream a Markdown report
  6. Publish report, sources and images

PREREQUISITES:
  At least one of GOOGLE_API_KEY, GROQ_API_KEY, HUGGINGFACE_API_KEY or
  OLLAMA_MODEL in the environment or a .env file.

EXAMPLES:
  research-pipeline "quantum computing"
  research-pipeline --deep "solid-state batteries"
  research-pipeline --json "rust async runtimes" > events.jsonl
"#
)]
struct Args {
    /// The topic to research
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Deep research: more queries, images, longer report
    #[arg(short = 'd', long = "deep", default_value = "false")]
    deep: bool,

    /// Print progress events as JSON lines instead of text
    #[arg(short = 'j', long = "json", default_value = "false")]
    json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_logging(args.verbose, &config.log_level)?;

    config.log_status();
    config.validate()?;

    let workflow = ResearchWorkflow::from_config(&config);
    let json = args.json;
    let subscription = workflow.subscribe(move |event| print_event(event, json));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling research run");
            on_ctrl_c.cancel();
        }
    });

    let result = workflow
        .start_with_cancellation(args.topic.as_str(), args.deep, cancel)
        .await;
    subscription.unsubscribe();

    match result {
        Ok(state) => {
            if !args.json {
                print_summary(&state);
            }
            info!("Research completed");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Research failed");
            Err(e.into())
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================
fn print_event(event: &AgentEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Could not serialize event"),
        }
        return;
    }

    match event.kind {
        AgentEventKind::ReportChunk => {
            if let Some(chunk) = event.data.as_ref().and_then(|d| d.as_str()) {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(chunk.as_bytes());
                let _ = stdout.flush();
            }
        }
        // The summary after the run covers these.
        AgentEventKind::Complete | AgentEventKind::Image | AgentEventKind::Source => {}
        AgentEventKind::Error => eprintln!("[error] {}", event.message),
        _ => match &event.agent_name {
            Some(agent) => eprintln!("[{agent}] {}", event.message),
            None => eprintln!("{}", event.message),
        },
    }
}

fn print_summary(state: &PipelineState) {
    println!("\n\n{}", "=".repeat(60));
    println!("SOURCES ({})", state.sources.len());
    println!("{}", "=".repeat(60));
    for (i, source) in state.sources.iter().enumerate() {
        println!("{}. {} - {}", i + 1, source.title, source.uri);
    }

    if !state.images.is_empty() {
        println!("\nIMAGES ({})", state.images.len());
        for image in &state.images {
            println!("  {image}");
        }
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Logs go to stderr so stdout carries only the report.
fn init_logging(verbose: bool, default_level: &str) -> Result<()> {
    let fallback = if verbose { "debug" } else { default_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "What is Rust?"]);
        assert_eq!(args.topic, "What is Rust?");
        assert!(!args.deep);
        assert!(!args.json);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from(["test", "--deep", "--json", "-v", "fusion power"]);

        assert_eq!(args.topic, "fusion power");
        assert!(args.deep);
        assert!(args.json);
        assert!(args.verbose);
    }
}
