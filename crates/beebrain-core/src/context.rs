// ABOUTME: Conversation context builder for thread and channel-history windows.
// ABOUTME: Fetches platform history and maps it into chronological ConversationWindows.

use crate::error::Result;
use crate::message::{ConversationMessage, ConversationWindow};
use crate::platform::ChatPlatform;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How far back channel-fallback context reaches.
pub const CHANNEL_HORIZON_SECS: i64 = 60 * 60;

/// Maximum messages fetched for channel-fallback context.
pub const CHANNEL_HISTORY_LIMIT: u16 = 100;

/// Builds the conversation window that precedes a new message.
#[derive(Clone)]
pub struct ContextBuilder {
    platform: Arc<dyn ChatPlatform>,
}

impl ContextBuilder {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }

    /// Build a window for `channel_id`.
    ///
    /// With a thread anchor the whole thread is returned in platform order,
    /// anchor message included. Without one, the last hour of top-level
    /// channel messages is returned oldest first.
    pub async fn build(
        &self,
        channel_id: &str,
        thread_anchor: Option<&str>,
    ) -> Result<ConversationWindow> {
        self.build_at(channel_id, thread_anchor, Utc::now()).await
    }

    /// Like [`build`](Self::build), measuring the channel horizon from `now`.
    pub async fn build_at(
        &self,
        channel_id: &str,
        thread_anchor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ConversationWindow> {
        match thread_anchor.filter(|ts| !ts.is_empty()) {
            Some(thread_ts) => self.thread_window(channel_id, thread_ts).await,
            None => self.channel_window(channel_id, now).await,
        }
    }

    /// Build a window, falling back to an empty one if the platform read
    /// fails. A missing context never blocks a reply.
    pub async fn build_or_empty(
        &self,
        channel_id: &str,
        thread_anchor: Option<&str>,
    ) -> ConversationWindow {
        match self.build(channel_id, thread_anchor).await {
            Ok(window) => window,
            Err(e) => {
                warn!(
                    error = %e,
                    channel_id = %channel_id,
                    thread_ts = ?thread_anchor,
                    "Failed to build context, continuing with empty window"
                );
                ConversationWindow::new()
            }
        }
    }

    async fn thread_window(&self, channel_id: &str, thread_ts: &str) -> Result<ConversationWindow> {
        let replies = self.platform.thread_replies(channel_id, thread_ts).await?;
        let mut messages: Vec<ConversationMessage> =
            replies.iter().map(ConversationMessage::from).collect();
        self.resolve_author_names(&mut messages).await;

        debug!(
            channel_id = %channel_id,
            thread_ts = %thread_ts,
            count = messages.len(),
            "Built thread context"
        );
        Ok(ConversationWindow::from_messages(messages))
    }

    async fn channel_window(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConversationWindow> {
        let oldest = oldest_ts(now);
        let history = self
            .platform
            .channel_history(channel_id, &oldest, CHANNEL_HISTORY_LIMIT)
            .await?;

        // Platform delivers newest first.
        let mut messages: Vec<ConversationMessage> = history
            .iter()
            .rev()
            .filter(|msg| !msg.belongs_to_thread())
            .map(ConversationMessage::from)
            .collect();
        self.resolve_author_names(&mut messages).await;

        debug!(
            channel_id = %channel_id,
            oldest = %oldest,
            fetched = history.len(),
            kept = messages.len(),
            "Built channel context"
        );
        Ok(ConversationWindow::from_messages(messages))
    }

    /// Fill in display names the history payload left blank.
    ///
    /// Each distinct author is looked up once per window. A failed lookup
    /// leaves the name empty.
    async fn resolve_author_names(&self, messages: &mut [ConversationMessage]) {
        let mut names: HashMap<String, String> = HashMap::new();

        for author in messages.iter_mut().filter_map(|m| m.author.as_mut()) {
            if author.id.is_empty() || !author.name.is_empty() {
                continue;
            }
            if let Some(name) = names.get(&author.id) {
                author.name = name.clone();
                continue;
            }

            let name = match self.platform.user_name(&author.id).await {
                Ok(name) => name,
                Err(e) => {
                    debug!(error = %e, user_id = %author.id, "Failed to resolve author name");
                    String::new()
                }
            };
            names.insert(author.id.clone(), name.clone());
            author.name = name;
        }
    }
}

/// Platform timestamp one horizon before `now`.
fn oldest_ts(now: DateTime<Utc>) -> String {
    let oldest = now - Duration::seconds(CHANNEL_HORIZON_SECS);
    format!("{}.000000", oldest.timestamp())
}
