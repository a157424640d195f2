//! Question answering over a single video's transcript.
//!
//! A question is answered in two stages: the [`ContextResolver`] picks the
//! transcript text the model should see, then the [`AnswerSynthesizer`] turns
//! that context and the question into an answer.

pub mod context;
mod synthesizer;

pub use context::{ContextResolver, ContextResult, ContextSource, Strategy, NO_TRANSCRIPT_SENTINEL};
pub use synthesizer::{
    AnswerSynthesizer, CompletionOptions, CompletionService, OpenAICompletion, NO_ANSWER_FALLBACK,
};

use serde::{Deserialize, Serialize};

/// How context is selected for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchMode {
    /// Transcript words around the current playback position.
    #[serde(rename = "near", alias = "proximity")]
    Proximity,
    /// Best semantic match from the owner's index.
    #[default]
    #[serde(rename = "general", alias = "semantic")]
    Semantic,
}

impl SearchMode {
    /// Wire name, as accepted in the `searchType` request field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Proximity => "near",
            SearchMode::Semantic => "general",
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "near" | "proximity" => Ok(SearchMode::Proximity),
            "general" | "semantic" => Ok(SearchMode::Semantic),
            _ => Err(format!("Unknown search type: {}", s)),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student's question about one video.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub video_id: String,
    pub question: String,
    pub mode: SearchMode,
    /// Playback position; only read in proximity mode. Unvalidated client input.
    pub playback_time_seconds: Option<f64>,
    /// Search type as the client sent it; echoed back in the answer.
    pub requested_search_type: Option<String>,
}

impl Query {
    pub fn proximity(
        video_id: impl Into<String>,
        question: impl Into<String>,
        playback_time_seconds: Option<f64>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            question: question.into(),
            mode: SearchMode::Proximity,
            playback_time_seconds,
            requested_search_type: None,
        }
    }

    pub fn semantic(video_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            question: question.into(),
            mode: SearchMode::Semantic,
            playback_time_seconds: None,
            requested_search_type: None,
        }
    }

    /// Search type reported back to the client: the raw request value when
    /// one was sent, otherwise the mode's wire name.
    pub fn search_type_label(&self) -> String {
        self.requested_search_type
            .clone()
            .unwrap_or_else(|| self.mode.as_str().to_string())
    }
}

/// The answer returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub answer: String,
    pub question: String,
    pub search_type: String,
    pub using_semantic_index: bool,
    /// Where the context came from; kept out of the wire format.
    #[serde(skip_serializing)]
    pub context_source: ContextSource,
}
