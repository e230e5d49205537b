// ABOUTME: Qdrant REST client implementing the pipeline's VectorStore seam.
// ABOUTME: Creates the message collection, upserts embedded messages, and searches them.

use crate::config::VectorStoreConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use beebrain_core::{BrainError, StoredMessage, VectorStore};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Upserts wait for indexing, so they get more room than reads.
const UPSERT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QdrantClient {
    client: Client,
    base_url: String,
    collection: String,
    vector_size: u64,
    timeout: Duration,
}

#[derive(Serialize)]
struct Point<'a> {
    id: String,
    vector: &'a [f32],
    payload: &'a StoredMessage,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    payload: Option<StoredMessage>,
}

impl QdrantClient {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            vector_size: config.vector_size,
            timeout: config.timeout(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Create the collection with cosine distance if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        let url = self.collection_url();
        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        match response.status() {
            status if status.is_success() => {
                debug!(collection = %self.collection, "Collection already exists");
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(BotError::Config(format!(
                    "Qdrant collection check returned {}",
                    status
                )));
            }
        }

        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine",
            }
        });
        let response = self
            .client
            .put(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BotError::Config(format!(
                "Failed to create Qdrant collection {}: {}",
                self.collection,
                response.status()
            )));
        }

        info!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "Created Qdrant collection"
        );
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn store_message(&self, message: StoredMessage) -> beebrain_core::Result<()> {
        let point = Point {
            id: Uuid::new_v4().to_string(),
            vector: &message.embedding,
            payload: &message,
        };
        let body = json!({ "points": [point] });

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&body)
            .timeout(UPSERT_TIMEOUT)
            .send()
            .await
            .map_err(|e| BrainError::VectorStore(format!("upsert failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BrainError::VectorStore(format!(
                "upsert returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn search_similar(
        &self,
        embedding: &[f32],
        limit: u64,
    ) -> beebrain_core::Result<Vec<StoredMessage>> {
        let body = json!({
            "vector": embedding,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BrainError::VectorStore(format!("search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BrainError::VectorStore(format!(
                "search returned {}",
                response.status()
            )));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| BrainError::VectorStore(format!("invalid search response: {}", e)))?;

        debug!(hits = results.result.len(), "Vector search completed");
        Ok(results
            .result
            .into_iter()
            .filter_map(|point| point.payload)
            .collect())
    }
}
