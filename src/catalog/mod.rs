//! Video catalog: transcripts and durations for uploaded lectures.

mod sqlite;

pub use sqlite::SqliteCatalog;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lecture video as seen by the question-answering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    /// Owner of the video; selects the semantic index collection.
    pub teacher_id: String,
    pub title: String,
    /// Full transcript text. May be empty.
    #[serde(default)]
    pub transcript: String,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl Video {
    pub fn new(
        id: impl Into<String>,
        teacher_id: impl Into<String>,
        title: impl Into<String>,
        transcript: impl Into<String>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            id: id.into(),
            teacher_id: teacher_id.into(),
            title: title.into(),
            transcript: transcript.into(),
            duration_seconds,
            created_at: Utc::now(),
        }
    }

    /// Number of whitespace-separated words in the transcript.
    pub fn word_count(&self) -> usize {
        self.transcript.split_whitespace().count()
    }
}

/// Read/write access to stored videos.
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Fetch a video by id.
    async fn get_video(&self, id: &str) -> Result<Option<Video>>;

    /// Insert or replace a video.
    async fn upsert_video(&self, video: &Video) -> Result<()>;

    /// All videos, newest first.
    async fn list_videos(&self) -> Result<Vec<Video>>;

    /// Remove a video. Returns whether it existed.
    async fn delete_video(&self, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_serializes_camel_case() {
        let video = Video::new("v1", "t1", "Kinematics", "one two three", 60.0);
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["teacherId"], "t1");
        assert_eq!(json["durationSeconds"], 60.0);
        assert_eq!(video.word_count(), 3);
    }
}
