//! In-memory semantic index implementation.
//!
//! Useful for testing and single-process deployments.

use super::{
    squared_l2_distance, CollectionHandle, IndexedTranscript, NearestMatches, SemanticIndex,
};
use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Collections = HashMap<String, HashMap<String, IndexedTranscript>>;

/// In-memory semantic index.
pub struct MemorySemanticIndex {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<Collections>,
}

impl MemorySemanticIndex {
    /// Create a new, empty in-memory index.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> SporError {
        SporError::SemanticIndex(format!("Failed to acquire lock: {}", e))
    }
}

#[async_trait]
impl SemanticIndex for MemorySemanticIndex {
    async fn heartbeat(&self) -> Result<()> {
        self.collections.read().map_err(Self::poisoned)?;
        Ok(())
    }

    async fn collection_exists(&self, owner_id: &str) -> Result<bool> {
        let collections = self.collections.read().map_err(Self::poisoned)?;
        Ok(collections.contains_key(&CollectionHandle::local(owner_id).name))
    }

    async fn get_or_create_collection(&self, owner_id: &str) -> Result<CollectionHandle> {
        let handle = CollectionHandle::local(owner_id);
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        collections.entry(handle.name.clone()).or_default();
        Ok(handle)
    }

    async fn has_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool> {
        let collections = self.collections.read().map_err(Self::poisoned)?;
        Ok(collections
            .get(&collection.name)
            .is_some_and(|docs| docs.contains_key(video_id)))
    }

    async fn query_nearest(
        &self,
        collection: &CollectionHandle,
        text: &str,
        limit: usize,
    ) -> Result<NearestMatches> {
        let query_embedding = self.embedder.embed(text).await?;

        let collections = self.collections.read().map_err(Self::poisoned)?;
        let Some(docs) = collections.get(&collection.name) else {
            return Ok(NearestMatches::default());
        };

        let mut scored: Vec<(f32, &IndexedTranscript)> = docs
            .values()
            .map(|doc| (squared_l2_distance(&query_embedding, &doc.embedding), doc))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(NearestMatches {
            documents: scored.iter().map(|(_, doc)| doc.content.clone()).collect(),
            distances: scored.iter().map(|(d, _)| *d).collect(),
        })
    }

    async fn upsert_document(
        &self,
        collection: &CollectionHandle,
        video_id: &str,
        content: &str,
    ) -> Result<()> {
        let embedding = self.embedder.embed(content).await?;
        let doc = IndexedTranscript::new(video_id, &collection.owner_id, content, embedding);

        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        collections
            .entry(collection.name.clone())
            .or_default()
            .insert(video_id.to_string(), doc);
        Ok(())
    }

    async fn delete_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool> {
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        Ok(collections
            .get_mut(&collection.name)
            .and_then(|docs| docs.remove(video_id))
            .is_some())
    }
}
