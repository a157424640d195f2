//! Chroma HTTP client.
//!
//! Talks to a Chroma server's v1 REST API. Embeddings are computed locally by
//! the configured embedder and sent as `embeddings` / `query_embeddings`.

use super::{collection_name, CollectionHandle, NearestMatches, SemanticIndex};
use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Semantic index backed by a Chroma server.
pub struct ChromaSemanticIndex {
    endpoint: String,
    client: Client,
    embedder: Arc<dyn Embedder>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Results for the first (and only) query text.
    fn into_matches(self) -> NearestMatches {
        let documents = self
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let distances = self
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let (documents, distances) = documents
            .into_iter()
            .zip(distances)
            .filter_map(|(doc, dist)| Some((doc?, dist?)))
            .unzip();

        NearestMatches {
            documents,
            distances,
        }
    }
}

impl ChromaSemanticIndex {
    /// Create a client for the Chroma server at `endpoint`.
    pub fn new(endpoint: &str, embedder: Arc<dyn Embedder>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SporError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            embedder,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.endpoint, path)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SporError::SemanticIndex(format!(
            "Chroma {} failed ({}): {}",
            action, status, body
        )))
    }
}

#[async_trait]
impl SemanticIndex for ChromaSemanticIndex {
    async fn heartbeat(&self) -> Result<()> {
        let response = self.client.get(self.url("heartbeat")).send().await?;
        Self::check(response, "heartbeat").await?;
        Ok(())
    }

    async fn collection_exists(&self, owner_id: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}", collection_name(owner_id))))
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    #[instrument(skip(self))]
    async fn get_or_create_collection(&self, owner_id: &str) -> Result<CollectionHandle> {
        let response = self
            .client
            .post(self.url("collections"))
            .json(&json!({ "name": collection_name(owner_id), "get_or_create": true }))
            .send()
            .await?;
        let collection: CollectionResponse =
            Self::check(response, "get_or_create_collection").await?.json().await?;

        debug!("Resolved collection {} ({})", collection.name, collection.id);

        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
            owner_id: owner_id.to_string(),
        })
    }

    async fn has_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool> {
        let response = self
            .client
            .post(self.url(&format!("collections/{}/get", collection.id)))
            .json(&json!({ "ids": [video_id], "include": [] }))
            .send()
            .await?;
        let found: GetResponse = Self::check(response, "get").await?.json().await?;
        Ok(found.ids.iter().any(|id| id == video_id))
    }

    #[instrument(skip(self, text), fields(collection = %collection.name))]
    async fn query_nearest(
        &self,
        collection: &CollectionHandle,
        text: &str,
        limit: usize,
    ) -> Result<NearestMatches> {
        let query_embedding = self.embedder.embed(text).await?;

        let response = self
            .client
            .post(self.url(&format!("collections/{}/query", collection.id)))
            .json(&json!({
                "query_embeddings": [query_embedding],
                "n_results": limit,
                "include": ["documents", "distances"],
            }))
            .send()
            .await?;
        let result: QueryResponse = Self::check(response, "query").await?.json().await?;

        Ok(result.into_matches())
    }

    async fn upsert_document(
        &self,
        collection: &CollectionHandle,
        video_id: &str,
        content: &str,
    ) -> Result<()> {
        let embedding = self.embedder.embed(content).await?;

        let response = self
            .client
            .post(self.url(&format!("collections/{}/upsert", collection.id)))
            .json(&json!({
                "ids": [video_id],
                "embeddings": [embedding],
                "documents": [content],
                "metadatas": [{ "userId": collection.owner_id, "videoId": video_id }],
            }))
            .send()
            .await?;
        Self::check(response, "upsert").await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &CollectionHandle, video_id: &str) -> Result<bool> {
        if !self.has_document(collection, video_id).await? {
            return Ok(false);
        }

        let response = self
            .client
            .post(self.url(&format!("collections/{}/delete", collection.id)))
            .json(&json!({ "ids": [video_id] }))
            .send()
            .await?;
        Self::check(response, "delete").await?;
        Ok(true)
    }
}
