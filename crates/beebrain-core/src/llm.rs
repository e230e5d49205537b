// ABOUTME: LLM backend collaborator trait and chat wire message type.
// ABOUTME: Chat completion, free-form generation, and embeddings.

use crate::error::Result;
use crate::message::{ConversationMessage, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

/// One role/content pair submitted to a chat completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

impl From<&ConversationMessage> for ChatMessage {
    fn from(msg: &ConversationMessage) -> Self {
        Self {
            role: msg.role.into(),
            content: msg.content.clone(),
        }
    }
}

/// Language-model backend.
///
/// `chat` and `generate` succeed only when the backend signals a finished
/// completion; a partial response is [`BrainError::IncompleteCompletion`](crate::BrainError::IncompleteCompletion).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
