//! Semantic index abstraction for Spør.
//!
//! Transcripts are grouped into one collection per content owner (the teacher
//! who uploaded the video). Each collection maps a video id to its transcript
//! text and embedding, and answers nearest-neighbour queries by distance
//! (lower is more similar).

mod chroma;
mod memory;
mod sqlite;

pub use chroma::ChromaSemanticIndex;
pub use memory::MemorySemanticIndex;
pub use sqlite::SqliteSemanticIndex;

use crate::config::{SemanticIndexProvider, Settings};
use crate::embedding::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Name of the collection holding an owner's transcripts.
pub fn collection_name(owner_id: &str) -> String {
    format!("user_{}_transcripts", owner_id)
}

/// A resolved collection in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    /// Backend identifier (equal to `name` for local backends).
    pub id: String,
    /// Collection name.
    pub name: String,
    /// Owner this collection belongs to.
    pub owner_id: String,
}

impl CollectionHandle {
    /// Handle for a local backend, where the id is the name.
    pub fn local(owner_id: &str) -> Self {
        let name = collection_name(owner_id);
        Self {
            id: name.clone(),
            name,
            owner_id: owner_id.to_string(),
        }
    }
}

/// Documents and distances returned by a nearest-neighbour query, closest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearestMatches {
    pub documents: Vec<String>,
    pub distances: Vec<f32>,
}

impl NearestMatches {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() || self.distances.is_empty()
    }

    /// Smallest distance in the result set.
    pub fn closest_distance(&self) -> Option<f32> {
        self.distances
            .iter()
            .copied()
            .filter(|d| !d.is_nan())
            .reduce(f32::min)
    }

    /// All returned documents separated by a blank line.
    pub fn joined_documents(&self) -> String {
        self.documents.join("\n\n")
    }
}

/// A transcript stored in a local index backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedTranscript {
    /// Video this transcript belongs to (also its document id).
    pub video_id: String,
    /// Owner of the containing collection.
    pub owner_id: String,
    /// Full transcript text.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl IndexedTranscript {
    pub fn new(video_id: &str, owner_id: &str, content: &str, embedding: Vec<f32>) -> Self {
        Self {
            video_id: video_id.to_string(),
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Trait for semantic index implementations.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Cheap reachability check.
    async fn heartbeat(&self) -> Result<()>;

    /// Whether the owner already has a collection.
    async fn collection_exists(&self, owner_id: &str) -> Result<bool>;

    /// Look up the owner's collection, creating it if needed.
    async fn get_or_create_collection(&self, owner_id: &str) -> Result<CollectionHandle>;

    /// Whether the collection holds a document for the video.
    async fn has_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool>;

    /// Query the `limit` documents closest to `text`.
    async fn query_nearest(
        &self,
        collection: &CollectionHandle,
        text: &str,
        limit: usize,
    ) -> Result<NearestMatches>;

    /// Store (or replace) the transcript for a video.
    async fn upsert_document(
        &self,
        collection: &CollectionHandle,
        video_id: &str,
        content: &str,
    ) -> Result<()>;

    /// Remove the transcript for a video. Returns whether anything was removed.
    async fn delete_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool>;
}

/// Build the configured semantic index backend.
pub fn from_settings(
    settings: &Settings,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn SemanticIndex>> {
    let index: Arc<dyn SemanticIndex> = match settings.semantic_index.provider {
        SemanticIndexProvider::Sqlite => {
            Arc::new(SqliteSemanticIndex::new(&settings.vector_db_path(), embedder)?)
        }
        SemanticIndexProvider::Chroma => Arc::new(ChromaSemanticIndex::new(
            &settings.semantic_index.resolved_chroma_url(),
            embedder,
            settings.semantic_index.query_timeout(),
        )?),
        SemanticIndexProvider::Memory => Arc::new(MemorySemanticIndex::new(embedder)),
    };

    info!("Using {} semantic index", settings.semantic_index.provider);
    Ok(index)
}

/// Squared Euclidean distance between two vectors.
///
/// Mismatched or empty vectors are infinitely far apart.
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::INFINITY;
    }

    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
