//! Student progress tracking.
//!
//! The question-answering pipeline only ever calls
//! [`QuestionTracker::record_question_asked`]; reading progress back is for
//! reporting.

mod sqlite;

pub use sqlite::SqliteProgressTracker;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-(student, video) progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student_id: String,
    pub video_id: String,
    pub questions_asked: u32,
    pub last_active_at: DateTime<Utc>,
}

/// Sink for "student asked a question about this video" events.
#[async_trait]
pub trait QuestionTracker: Send + Sync {
    /// Increment the question counter for the student and video.
    async fn record_question_asked(&self, student_id: &str, video_id: &str) -> Result<()>;

    /// All progress records for a student, most recently active first.
    async fn progress_for_student(&self, student_id: &str) -> Result<Vec<StudentProgress>>;
}
