//! Spør - Ask questions about lecture videos
//!
//! A question-answering service for e-learning videos. Students ask about a
//! video they are watching and get an answer grounded in its transcript.
//!
//! The name "Spør" is the Norwegian word for "ask."
//!
//! # Overview
//!
//! Spør answers a question in one of two modes:
//! - `near` uses the transcript words around the student's playback position
//! - `general` uses the closest match in the teacher's semantic index, and
//!   falls back to the full transcript when the index is unreachable or the
//!   match is not relevant enough
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `catalog` - Video and transcript storage
//! - `embedding` - Embedding generation
//! - `semantic_index` - Per-teacher transcript indexes (SQLite, Chroma, memory)
//! - `qa` - Context resolution and answer synthesis
//! - `tracking` - Per-student question counters
//! - `orchestrator` - Request coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use spor::config::Settings;
//! use spor::orchestrator::Orchestrator;
//! use spor::qa::Query;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let query = Query::proximity("intro-to-physics", "What did she just say about inertia?", Some(42.0));
//!     let result = orchestrator.answer_question(&query, Some("student-7")).await?;
//!     println!("{}", result.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod qa;
pub mod semantic_index;
pub mod tracking;

pub use error::{Result, SporError};
