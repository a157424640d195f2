//! Add command implementation.

use crate::catalog::Video;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};

/// Run the add command.
pub async fn run_add(
    transcript_file: &str,
    id: &str,
    teacher: &str,
    title: Option<String>,
    duration: f64,
    index: bool,
    settings: Settings,
) -> Result<()> {
    let operation = if index { Operation::Index } else { Operation::Catalog };
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Use --no-index to store the video without indexing it.");
        return Err(e.into());
    }

    let path = Settings::expand_path(transcript_file);
    let transcript = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read transcript from {}", path.display()))?;

    let title = title.unwrap_or_else(|| id.to_string());
    let video = Video::new(id, teacher, title, transcript.trim(), duration);

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner(if index { "Storing and indexing..." } else { "Storing..." });
    let result = orchestrator.add_video(&video, index).await;
    spinner.finish_and_clear();

    let result = result?;
    Output::success(&format!("Added {} ({} words)", result.video_id, result.word_count));
    if index && !result.indexed {
        Output::warning("Transcript was not indexed; general questions will use the full transcript.");
    }

    Ok(())
}
