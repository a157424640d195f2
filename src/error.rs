//! Error types for Spør.

use thiserror::Error;

/// Library-level error type for Spør operations.
#[derive(Error, Debug)]
pub enum SporError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Semantic index error: {0}")]
    SemanticIndex(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Answer synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Question tracking failed: {0}")]
    Tracking(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SporError {
    /// Whether this error should be reported to clients as a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SporError::VideoNotFound(_))
    }
}

/// Result type alias for Spør operations.
pub type Result<T> = std::result::Result<T, SporError>;
