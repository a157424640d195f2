//! SQLite-backed progress tracker.

use super::{QuestionTracker, StudentProgress};
use crate::error::{Result, SporError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS student_progress (
        student_id TEXT NOT NULL,
        video_id TEXT NOT NULL,
        questions_asked INTEGER NOT NULL DEFAULT 0,
        last_active_at TEXT NOT NULL,
        PRIMARY KEY (student_id, video_id)
    );
"#;

/// SQLite-backed question tracker.
pub struct SqliteProgressTracker {
    conn: Mutex<Connection>,
}

impl SqliteProgressTracker {
    /// Open (or create) the tracker tables in the given database.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory tracker (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SporError::Tracking(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl QuestionTracker for SqliteProgressTracker {
    #[instrument(skip(self))]
    async fn record_question_asked(&self, student_id: &str, video_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO student_progress (student_id, video_id, questions_asked, last_active_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT (student_id, video_id) DO UPDATE SET
                questions_asked = questions_asked + 1,
                last_active_at = excluded.last_active_at
            "#,
            params![student_id, video_id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| SporError::Tracking(e.to_string()))?;

        debug!("Recorded question for student {} on video {}", student_id, video_id);
        Ok(())
    }

    async fn progress_for_student(&self, student_id: &str) -> Result<Vec<StudentProgress>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT student_id, video_id, questions_asked, last_active_at
            FROM student_progress
            WHERE student_id = ?1
            ORDER BY last_active_at DESC
            "#,
        )?;

        let rows = stmt.query_map(params![student_id], |row| {
            let last_active_str: String = row.get(3)?;
            Ok(StudentProgress {
                student_id: row.get(0)?,
                video_id: row.get(1)?,
                questions_asked: row.get(2)?,
                last_active_at: DateTime::parse_from_rfc3339(&last_active_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_question_counter_increments() {
        let tracker = SqliteProgressTracker::in_memory().unwrap();
        tracker.record_question_asked("s1", "v1").await.unwrap();
        tracker.record_question_asked("s1", "v1").await.unwrap();
        tracker.record_question_asked("s1", "v2").await.unwrap();
        tracker.record_question_asked("s2", "v1").await.unwrap();

        let progress = tracker.progress_for_student("s1").await.unwrap();
        assert_eq!(progress.len(), 2);

        let v1 = progress.iter().find(|p| p.video_id == "v1").unwrap();
        assert_eq!(v1.questions_asked, 2);

        let v2 = progress.iter().find(|p| p.video_id == "v2").unwrap();
        assert_eq!(v2.questions_asked, 1);
    }

    #[tokio::test]
    async fn test_unknown_student_has_no_progress() {
        let tracker = SqliteProgressTracker::in_memory().unwrap();
        assert!(tracker.progress_for_student("nobody").await.unwrap().is_empty());
    }
}
