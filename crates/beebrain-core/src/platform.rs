// ABOUTME: Chat platform collaborator trait used by the pipeline.
// ABOUTME: Covers history and thread reads, message posting, and reactions.

use crate::error::Result;
use crate::message::HistoryMessage;
use async_trait::async_trait;

/// Read and write access to the chat platform.
///
/// Implementations bound every call with their own timeout and report
/// failures as [`BrainError::Platform`](crate::BrainError::Platform) or
/// [`BrainError::Timeout`](crate::BrainError::Timeout).
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The agent's own user id on the platform.
    fn bot_user_id(&self) -> &str;

    /// Channel history no older than `oldest`, at most `limit` messages,
    /// newest first as the platform delivers it.
    async fn channel_history(
        &self,
        channel_id: &str,
        oldest: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>>;

    /// Every message of the thread anchored at `thread_ts`, parent first.
    async fn thread_replies(&self, channel_id: &str, thread_ts: &str)
        -> Result<Vec<HistoryMessage>>;

    /// A single message by timestamp, whether top-level or in a thread.
    async fn fetch_message(&self, channel_id: &str, ts: &str) -> Result<Option<HistoryMessage>>;

    /// Display name for a user id.
    async fn user_name(&self, user_id: &str) -> Result<String>;

    /// Post text into a channel, optionally into a thread. Returns the new ts.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String>;

    async fn add_reaction(&self, channel_id: &str, ts: &str, name: &str) -> Result<()>;

    async fn remove_reaction(&self, channel_id: &str, ts: &str, name: &str) -> Result<()>;
}
