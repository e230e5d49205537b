// ABOUTME: Error types for beebrain-core.
// ABOUTME: Defines BrainError covering collaborator, completion, and decoding failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrainError {
    #[error("Chat platform error: {0}")]
    Platform(String),

    #[error("LLM backend error: {0}")]
    Llm(String),

    #[error("LLM backend reported an incomplete completion")]
    IncompleteCompletion,

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("Malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BrainError>;
