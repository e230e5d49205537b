// ABOUTME: Ollama HTTP client implementing the pipeline's LlmBackend seam.
// ABOUTME: Non-streaming chat, generate, and embeddings calls over reqwest.

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use beebrain_core::{BrainError, ChatMessage, LlmBackend};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// Ollama API client for one configured model.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a client. Only connection setup is bounded; generation may
    /// take as long as the model needs.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model().to_string(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> beebrain_core::Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BrainError::Llm(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrainError::Llm(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BrainError::Llm(format!("invalid response from {}: {}", path, e)))
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> beebrain_core::Result<String> {
        debug!(model = %self.model, messages = messages.len(), "Sending chat request to Ollama");
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let response: ChatResponse = self.post("/api/chat", &request).await?;
        if !response.done {
            return Err(BrainError::IncompleteCompletion);
        }
        response
            .message
            .map(|m| m.content)
            .ok_or_else(|| BrainError::Llm("chat response has no message".to_string()))
    }

    async fn generate(&self, prompt: &str) -> beebrain_core::Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending generate request to Ollama");
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response: GenerateResponse = self.post("/api/generate", &request).await?;
        if !response.done {
            return Err(BrainError::IncompleteCompletion);
        }
        Ok(response.response)
    }

    async fn embed(&self, text: &str) -> beebrain_core::Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let response: EmbeddingResponse = self.post("/api/embeddings", &request).await?;
        if response.embedding.is_empty() {
            return Err(BrainError::Llm("empty embedding".to_string()));
        }
        Ok(response.embedding)
    }
}
