// ABOUTME: Response composer that turns a conversation window into a model request.
// ABOUTME: Chat mode sends structured messages; generate mode sends a flat transcript.

use crate::error::{BrainError, Result};
use crate::llm::{ChatMessage, LlmBackend};
use crate::message::{ConversationMessage, ConversationWindow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Posted in place of a reply whenever the backend fails.
pub const APOLOGY: &str = "Sorry, I encountered an error processing your request.";

/// Style and formatting directives for conversational replies.
pub const REPLY_INSTRUCTION: &str = "Respond in a conversational, human voice, with a neutral tone. \
Use short sentences and simple words. Avoid academic language, transition phrases, and corporate jargon. \
Make it sound like someone talking to a friend in simple terms. Keep the key points but strip away any unnecessary words. \
Use Slack formatting: *bold* for emphasis, _italic_ for subtle emphasis, `code` for code, \
```code block``` for multiple lines of code, and • for bullet points. Do not use markdown formatting.";

/// Replaces [`REPLY_INSTRUCTION`] when summarizing a thread.
pub const SUMMARY_INSTRUCTION: &str = "Provide a concise summary of the conversation thread above. \
Focus on the key points and main ideas. Keep it brief but informative and use • bullet points for clarity. \
Use Slack formatting: *bold* for emphasis and `code` for code. Do not use markdown formatting.";

/// Heading placed above every posted summary.
pub const SUMMARY_HEADING: &str = ":memo: *Thread summary*";

/// Prompt assembly strategy, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Structured role/content list to a chat completion.
    Chat,
    /// Flattened authored transcript to a free-form completion.
    #[default]
    Generate,
}

/// Which instruction accompanies the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Reply,
    Summary,
}

impl Prompt {
    pub fn instruction(self) -> &'static str {
        match self {
            Prompt::Reply => REPLY_INSTRUCTION,
            Prompt::Summary => SUMMARY_INSTRUCTION,
        }
    }
}

/// The request shape handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmRequest {
    Chat(Vec<ChatMessage>),
    Generate(String),
}

pub struct ResponseComposer {
    llm: Arc<dyn LlmBackend>,
    mode: ResponseMode,
}

impl ResponseComposer {
    pub fn new(llm: Arc<dyn LlmBackend>, mode: ResponseMode) -> Self {
        Self { llm, mode }
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// Assemble the backend request for `window` followed by `new_message`.
    pub fn build_request(
        &self,
        window: &ConversationWindow,
        new_message: Option<&ConversationMessage>,
        prompt: Prompt,
    ) -> LlmRequest {
        let conversation = window.iter().chain(new_message);
        match self.mode {
            ResponseMode::Chat => {
                let mut messages = Vec::with_capacity(window.len() + 2);
                messages.push(ChatMessage::system(prompt.instruction()));
                messages.extend(conversation.map(ChatMessage::from));
                LlmRequest::Chat(messages)
            }
            ResponseMode::Generate => {
                let mut transcript = String::new();
                for msg in conversation {
                    transcript.push_str(&msg.transcript_line());
                    transcript.push('\n');
                }
                transcript.push_str(prompt.instruction());
                LlmRequest::Generate(transcript)
            }
        }
    }

    /// Obtain a reply, surfacing backend failures.
    pub async fn try_compose(
        &self,
        window: &ConversationWindow,
        new_message: &ConversationMessage,
    ) -> Result<String> {
        let request = self.build_request(window, Some(new_message), Prompt::Reply);
        self.complete(request).await
    }

    /// Obtain a reply; any backend failure becomes [`APOLOGY`].
    pub async fn compose(
        &self,
        window: &ConversationWindow,
        new_message: &ConversationMessage,
    ) -> String {
        match self.try_compose(window, new_message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, mode = ?self.mode, "Failed to compose reply");
                APOLOGY.to_string()
            }
        }
    }

    /// Summarize `window` under [`SUMMARY_HEADING`]; failure becomes [`APOLOGY`].
    pub async fn summarize(&self, window: &ConversationWindow) -> String {
        let request = self.build_request(window, None, Prompt::Summary);
        match self.complete(request).await {
            Ok(summary) => format!("{}\n\n{}", SUMMARY_HEADING, summary),
            Err(e) => {
                error!(error = %e, mode = ?self.mode, "Failed to compose summary");
                APOLOGY.to_string()
            }
        }
    }

    async fn complete(&self, request: LlmRequest) -> Result<String> {
        let reply = match request {
            LlmRequest::Chat(messages) => {
                debug!(messages = messages.len(), "Requesting chat completion");
                self.llm.chat(&messages).await?
            }
            LlmRequest::Generate(prompt) => {
                debug!(prompt_len = prompt.len(), "Requesting generation");
                self.llm.generate(&prompt).await?
            }
        };

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(BrainError::Llm("empty completion".to_string()));
        }
        Ok(reply.to_string())
    }
}
