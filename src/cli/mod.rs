//! CLI module for Spør.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Spør - Ask questions about lecture videos
///
/// Answers student questions from video transcripts, either around the
/// current playback position or through a teacher's semantic index.
/// The name "Spør" is the Norwegian word for "ask."
#[derive(Parser, Debug)]
#[command(name = "spor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP question-answering server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question about a video
    Ask {
        /// Video ID
        video_id: String,

        /// The question to ask
        question: String,

        /// Answer from the transcript around this playback position (seconds)
        #[arg(short, long)]
        near: Option<f64>,

        /// Record the question for this student
        #[arg(short, long)]
        student: Option<String>,
    },

    /// Register a video from a plain-text transcript file
    Add {
        /// Path to the transcript file
        transcript_file: String,

        /// Video ID
        #[arg(long)]
        id: String,

        /// Teacher (owner) ID
        #[arg(long)]
        teacher: String,

        /// Video title (defaults to the video ID)
        #[arg(long)]
        title: Option<String>,

        /// Video duration in seconds
        #[arg(long, default_value = "0")]
        duration: f64,

        /// Store the video without indexing its transcript
        #[arg(long)]
        no_index: bool,
    },

    /// List registered videos
    List,

    /// Remove a video and its indexed transcript
    Remove {
        /// Video ID
        video_id: String,
    },

    /// Check configuration and backend connectivity
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
