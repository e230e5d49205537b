// ABOUTME: Vector store collaborator trait for passive message capture.
// ABOUTME: Stores embedded messages and runs similarity searches over them.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message as persisted in the vector store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn store_message(&self, message: StoredMessage) -> Result<()>;

    /// Stored messages ranked by similarity to `embedding`, best first.
    async fn search_similar(&self, embedding: &[f32], limit: u64) -> Result<Vec<StoredMessage>>;
}
