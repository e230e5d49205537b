// ABOUTME: Reaction-triggered summarization of the agent's own replies.
// ABOUTME: Summarizes the reacted-to message's thread and posts into that thread.

use crate::composer::ResponseComposer;
use crate::context::ContextBuilder;
use crate::event::ReactionEvent;
use crate::message::ConversationMessage;
use crate::platform::ChatPlatform;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reaction name that requests a summary.
pub const DEFAULT_SUMMARY_REACTION: &str = "robot_face";

/// What the handler did with a reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Not the sentinel reaction, or not on one of the agent's messages.
    Ignored,
    /// A summary was composed and a post was attempted into `thread_ts`.
    Summarized { thread_ts: String, posted: bool },
}

pub struct ReactionHandler {
    platform: Arc<dyn ChatPlatform>,
    context: ContextBuilder,
    composer: Arc<ResponseComposer>,
    sentinel: String,
}

impl ReactionHandler {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        context: ContextBuilder,
        composer: Arc<ResponseComposer>,
        sentinel: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            context,
            composer,
            sentinel: sentinel.into(),
        }
    }

    /// True if this reaction asks the agent to summarize one of its messages.
    pub fn is_trigger(&self, event: &ReactionEvent) -> bool {
        let bot = self.platform.bot_user_id();
        event.reaction == self.sentinel
            && event.item_user.as_deref() == Some(bot)
            && event.user_id != bot
    }

    pub async fn handle(&self, event: &ReactionEvent) -> ReactionOutcome {
        if !self.is_trigger(event) {
            debug!(
                reaction = %event.reaction,
                item_user = ?event.item_user,
                "Reaction is not a summary request on a bot message, skipping"
            );
            return ReactionOutcome::Ignored;
        }

        let channel_id = event.item_channel.as_str();
        let reacted = match self.platform.fetch_message(channel_id, &event.item_ts).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, channel_id = %channel_id, ts = %event.item_ts, "Failed to fetch reacted message");
                None
            }
        };

        let thread_ts = reacted
            .as_ref()
            .map(|msg| msg.thread_anchor().to_string())
            .unwrap_or_else(|| event.item_ts.clone());

        info!(
            channel_id = %channel_id,
            thread_ts = %thread_ts,
            user_id = %event.user_id,
            "Summarizing thread on reaction"
        );

        let mut window = self.context.build_or_empty(channel_id, Some(&thread_ts)).await;
        // The reacted-to message always closes the window, keeping any
        // author name resolved while building it.
        if let Some(msg) = reacted.as_ref() {
            let entry = window
                .take_ts(&msg.ts)
                .unwrap_or_else(|| ConversationMessage::from(msg));
            window.push(entry);
        }

        let summary = self.composer.summarize(&window).await;

        let posted = match self
            .platform
            .post_message(channel_id, &summary, Some(&thread_ts))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, channel_id = %channel_id, "Failed to post summary");
                false
            }
        };

        ReactionOutcome::Summarized { thread_ts, posted }
    }
}
