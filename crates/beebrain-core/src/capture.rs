// ABOUTME: Passive history capture of plain channel messages into the vector store.
// ABOUTME: Embeds message text and stores it; failures are logged and swallowed.

use crate::event::MessageEvent;
use crate::llm::LlmBackend;
use crate::vector::{StoredMessage, VectorStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error};

pub struct HistoryCapture {
    llm: Arc<dyn LlmBackend>,
    store: Arc<dyn VectorStore>,
}

impl HistoryCapture {
    pub fn new(llm: Arc<dyn LlmBackend>, store: Arc<dyn VectorStore>) -> Self {
        Self { llm, store }
    }

    /// Embed and store one message. Returns whether it was stored.
    pub async fn capture(&self, event: &MessageEvent) -> bool {
        if event.text.trim().is_empty() {
            return false;
        }

        let embedding = match self.llm.embed(&event.text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(error = %e, channel_id = %event.channel_id, "Failed to embed message");
                return false;
            }
        };

        let message = StoredMessage {
            text: event.text.clone(),
            user_id: event.user_id.clone(),
            channel_id: event.channel_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            thread_id: event.thread_ts.clone(),
            embedding,
        };

        match self.store.store_message(message).await {
            Ok(()) => {
                debug!(channel_id = %event.channel_id, "Stored message in vector store");
                true
            }
            Err(e) => {
                error!(error = %e, channel_id = %event.channel_id, "Failed to store message");
                false
            }
        }
    }
}
