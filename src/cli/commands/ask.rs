//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::qa::{ContextSource, Query};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    video_id: &str,
    question: &str,
    near: Option<f64>,
    student: Option<&str>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask { semantic: near.is_none() }, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spor doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let query = match near {
        Some(seconds) => Query::proximity(video_id, question, Some(seconds)),
        None => Query::semantic(video_id, question),
    };

    let spinner = Output::spinner("Thinking...");

    match orchestrator.answer_question(&query, student).await {
        Ok(result) => {
            spinner.finish_and_clear();

            println!("\n{}\n", result.answer);

            let source = match result.context_source {
                ContextSource::Proximity => "transcript around playback position",
                ContextSource::SemanticIndex => "semantic index match",
                ContextSource::SemanticFallbackFull => "full transcript",
                ContextSource::Empty => "no transcript",
            };
            Output::kv("Search type", &result.search_type);
            Output::kv("Context", source);
            Output::kv(
                "Semantic index",
                if result.using_semantic_index { "used" } else { "not used" },
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            if e.is_not_found() {
                Output::error(&format!("{}. Use 'spor list' to see registered videos.", e));
            } else {
                Output::error(&format!("Failed to generate answer: {}", e));
            }
            return Err(e.into());
        }
    }

    Ok(())
}
