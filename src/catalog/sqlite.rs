//! SQLite-backed video catalog.

use super::{Video, VideoCatalog};
use crate::error::{Result, SporError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS videos (
        id TEXT PRIMARY KEY,
        teacher_id TEXT NOT NULL,
        title TEXT NOT NULL,
        transcript TEXT NOT NULL DEFAULT '',
        duration_seconds REAL NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_videos_teacher ON videos(teacher_id, created_at);
"#;

/// SQLite-backed video catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized video catalog at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
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
            .map_err(|e| SporError::Config(format!("Failed to acquire catalog lock: {}", e)))
    }

    fn row_to_video(row: &Row<'_>) -> rusqlite::Result<Video> {
        let created_at_str: String = row.get(5)?;
        Ok(Video {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            title: row.get(2)?,
            transcript: row.get(3)?,
            duration_seconds: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl VideoCatalog for SqliteCatalog {
    #[instrument(skip(self))]
    async fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            r#"
            SELECT id, teacher_id, title, transcript, duration_seconds, created_at
            FROM videos WHERE id = ?1
            "#,
            params![id],
            Self::row_to_video,
        );

        match result {
            Ok(video) => Ok(Some(video)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, video), fields(video_id = %video.id))]
    async fn upsert_video(&self, video: &Video) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO videos
            (id, teacher_id, title, transcript, duration_seconds, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                video.id,
                video.teacher_id,
                video.title,
                video.transcript,
                video.duration_seconds,
                video.created_at.to_rfc3339(),
            ],
        )?;

        debug!("Stored video {}", video.id);
        Ok(())
    }

    async fn list_videos(&self) -> Result<Vec<Video>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, teacher_id, title, transcript, duration_seconds, created_at
            FROM videos
            ORDER BY created_at DESC
            "#,
        )?;

        let videos = stmt.query_map([], Self::row_to_video)?;
        Ok(videos.filter_map(|v| v.ok()).collect())
    }

    async fn delete_video(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
