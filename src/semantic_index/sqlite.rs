//! SQLite-based semantic index implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and distances are computed
//! in Rust. Each owner's collection is typically small (one document per
//! video), so a full scan per query is acceptable.

use super::{
    squared_l2_distance, CollectionHandle, IndexedTranscript, NearestMatches, SemanticIndex,
};
use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transcripts (
        collection TEXT NOT NULL,
        video_id TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, video_id)
    );
"#;

/// SQLite-based semantic index.
pub struct SqliteSemanticIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteSemanticIndex {
    /// Open (or create) an index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite semantic index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SporError::SemanticIndex(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn ensure_collection(conn: &Connection, collection: &CollectionHandle) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, owner_id, created_at) VALUES (?1, ?2, ?3)",
            params![collection.name, collection.owner_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// All transcripts stored in a collection.
    pub fn list_documents(&self, collection: &CollectionHandle) -> Result<Vec<IndexedTranscript>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT video_id, owner_id, content, embedding, indexed_at
            FROM transcripts
            WHERE collection = ?1
            ORDER BY video_id
            "#,
        )?;

        let rows = stmt.query_map(params![collection.name], |row| {
            let embedding_bytes: Vec<u8> = row.get(3)?;
            let indexed_at_str: String = row.get(4)?;
            Ok(IndexedTranscript {
                video_id: row.get(0)?,
                owner_id: row.get(1)?,
                content: row.get(2)?,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[async_trait]
impl SemanticIndex for SqliteSemanticIndex {
    async fn heartbeat(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    async fn collection_exists(&self, owner_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM collections WHERE name = ?1",
            params![super::collection_name(owner_id)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn get_or_create_collection(&self, owner_id: &str) -> Result<CollectionHandle> {
        let handle = CollectionHandle::local(owner_id);
        let conn = self.lock()?;
        Self::ensure_collection(&conn, &handle)?;
        Ok(handle)
    }

    async fn has_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transcripts WHERE collection = ?1 AND video_id = ?2",
            params![collection.name, video_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self, text), fields(collection = %collection.name))]
    async fn query_nearest(
        &self,
        collection: &CollectionHandle,
        text: &str,
        limit: usize,
    ) -> Result<NearestMatches> {
        let query_embedding = self.embedder.embed(text).await?;

        let mut scored: Vec<(f32, String)> = self
            .list_documents(collection)?
            .into_iter()
            .map(|doc| (squared_l2_distance(&query_embedding, &doc.embedding), doc.content))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!("Found {} candidate documents", scored.len());

        let (distances, documents) = scored.into_iter().unzip();
        Ok(NearestMatches {
            documents,
            distances,
        })
    }

    #[instrument(skip(self, content), fields(collection = %collection.name))]
    async fn upsert_document(
        &self,
        collection: &CollectionHandle,
        video_id: &str,
        content: &str,
    ) -> Result<()> {
        let embedding = self.embedder.embed(content).await?;

        let conn = self.lock()?;
        Self::ensure_collection(&conn, collection)?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO transcripts
            (collection, video_id, owner_id, content, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                collection.name,
                video_id,
                collection.owner_id,
                content,
                Self::embedding_to_bytes(&embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Indexed transcript for video {}", video_id);
        Ok(())
    }

    async fn delete_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM transcripts WHERE collection = ?1 AND video_id = ?2",
            params![collection.name, video_id],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic_index::test_support::FixedEmbedder;

    fn index() -> SqliteSemanticIndex {
        SqliteSemanticIndex::in_memory(Arc::new(FixedEmbedder::new(&[
            ("vectors and matrices", vec![1.0, 0.0, 0.0]),
            ("the french revolution", vec![0.0, 0.0, 1.0]),
            ("how do I multiply matrices?", vec![0.8, 0.0, 0.2]),
        ])))
        .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_semantic_index() {
        let index = index();
        index.heartbeat().await.unwrap();
        assert!(!index.collection_exists("t1").await.unwrap());

        let handle = index.get_or_create_collection("t1").await.unwrap();
        assert!(index.collection_exists("t1").await.unwrap());

        index.upsert_document(&handle, "v1", "vectors and matrices").await.unwrap();
        index.upsert_document(&handle, "v2", "the french revolution").await.unwrap();
        assert!(index.has_document(&handle, "v1").await.unwrap());
        assert!(!index.has_document(&handle, "v3").await.unwrap());

        let matches = index
            .query_nearest(&handle, "how do I multiply matrices?", 1)
            .await
            .unwrap();
        assert_eq!(matches.documents, vec!["vectors and matrices".to_string()]);
        assert!((matches.distances[0] - 0.08).abs() < 1e-5);

        assert!(index.delete_document(&handle, "v1").await.unwrap());
        assert_eq!(index.list_documents(&handle).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_blob_roundtrip() {
        let index = index();
        let handle = index.get_or_create_collection("owner").await.unwrap();
        index.upsert_document(&handle, "v1", "vectors and matrices").await.unwrap();

        let docs = index.list_documents(&handle).unwrap();
        assert_eq!(docs[0].embedding, vec![1.0, 0.0, 0.0]);
        assert_eq!(docs[0].owner_id, "owner");
    }
}
