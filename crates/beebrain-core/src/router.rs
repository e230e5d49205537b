// ABOUTME: Event router dispatching decoded webhook events through the pipeline.
// ABOUTME: Handles challenge echo, retry fast-path, dedup, replies, and reaction summaries.

use crate::capture::HistoryCapture;
use crate::composer::{ResponseComposer, ResponseMode};
use crate::context::ContextBuilder;
use crate::dedup::DedupStore;
use crate::event::{InboundEvent, MessageEvent};
use crate::llm::LlmBackend;
use crate::message::{Author, ConversationMessage};
use crate::platform::ChatPlatform;
use crate::reaction::{ReactionHandler, ReactionOutcome, DEFAULT_SUMMARY_REACTION};
use crate::vector::VectorStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dedup kind shared by app mentions and mentioning plain messages.
///
/// The platform delivers both for the same message with the same event
/// timestamp, so they must collapse onto one key.
const MENTION_KIND: &str = "mention";

/// Dedup kind for passive capture of plain messages.
const CAPTURE_KIND: &str = "message";

const UNKNOWN_USER: &str = "Unknown User";

/// Router behaviour knobs, read once at startup.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub mode: ResponseMode,
    /// Start a thread under top-level messages instead of replying in-channel.
    pub thread_replies: bool,
    /// Reaction shown on the source message while a reply is in progress.
    pub processing_reaction: String,
    /// Reaction on an agent message that requests a thread summary.
    pub summary_reaction: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: ResponseMode::default(),
            thread_replies: false,
            processing_reaction: "eyes".to_string(),
            summary_reaction: DEFAULT_SUMMARY_REACTION.to_string(),
        }
    }
}

/// Why an event was acknowledged without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The delivery carried a retry marker.
    Retry,
    /// Already handled within the retention horizon.
    Duplicate,
    /// Authored by the agent or another bot.
    BotAuthored,
    /// Plain message that does not mention the agent.
    NoMention,
    /// Event type the pipeline does not act on.
    Unsupported,
}

/// Result of routing one event. Every outcome is acknowledged with success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Echo this token back to the platform.
    Challenge(String),
    Replied {
        channel_id: String,
        thread_ts: Option<String>,
        posted: bool,
    },
    Reaction(ReactionOutcome),
    Skipped(SkipReason),
}

pub struct EventRouter {
    platform: Arc<dyn ChatPlatform>,
    dedup: Arc<DedupStore>,
    context: ContextBuilder,
    composer: Arc<ResponseComposer>,
    reactions: ReactionHandler,
    capture: Option<HistoryCapture>,
    config: RouterConfig,
}

impl EventRouter {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        llm: Arc<dyn LlmBackend>,
        dedup: Arc<DedupStore>,
        config: RouterConfig,
    ) -> Self {
        let context = ContextBuilder::new(Arc::clone(&platform));
        let composer = Arc::new(ResponseComposer::new(llm, config.mode));
        let reactions = ReactionHandler::new(
            Arc::clone(&platform),
            context.clone(),
            Arc::clone(&composer),
            config.summary_reaction.clone(),
        );

        Self {
            platform,
            dedup,
            context,
            composer,
            reactions,
            capture: None,
            config,
        }
    }

    /// Enable passive capture of plain messages into `store`.
    pub fn with_vector_store(mut self, llm: Arc<dyn LlmBackend>, store: Arc<dyn VectorStore>) -> Self {
        self.capture = Some(HistoryCapture::new(llm, store));
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route one decoded event.
    ///
    /// `retry_num` is the platform's retry marker for this delivery, if any.
    /// Retries never trigger model work.
    pub async fn route(&self, event: InboundEvent, retry_num: Option<&str>) -> RouteOutcome {
        if let InboundEvent::UrlChallenge { challenge } = &event {
            return RouteOutcome::Challenge(challenge.clone());
        }

        if let Some(retry) = retry_num.filter(|r| !r.is_empty()) {
            debug!(retry = %retry, kind = %event.kind(), "Retry delivery, acknowledging without processing");
            return RouteOutcome::Skipped(SkipReason::Retry);
        }

        match event {
            InboundEvent::UrlChallenge { challenge } => RouteOutcome::Challenge(challenge),
            InboundEvent::AppMention(ev) => self.handle_message(ev, MENTION_KIND, true).await,
            InboundEvent::PlainMessage(ev) => {
                if !self.is_from_bot(&ev) {
                    self.capture(&ev).await;
                }
                let mentioned = self.mentions_agent(&ev.text);
                self.handle_message(ev, MENTION_KIND, mentioned).await
            }
            InboundEvent::MessageEdited(ev) => {
                let mentioned = self.mentions_agent(&ev.text);
                self.handle_message(ev, "message_changed", mentioned).await
            }
            InboundEvent::ReactionAdded(ev) => {
                if !self.reactions.is_trigger(&ev) {
                    return RouteOutcome::Reaction(ReactionOutcome::Ignored);
                }
                if self.dedup.seen_before("reaction_added", &ev.event_ts) {
                    return RouteOutcome::Skipped(SkipReason::Duplicate);
                }
                RouteOutcome::Reaction(self.reactions.handle(&ev).await)
            }
            InboundEvent::Unsupported { kind } => {
                debug!(kind = %kind, "Unhandled event type");
                RouteOutcome::Skipped(SkipReason::Unsupported)
            }
        }
    }

    async fn handle_message(
        &self,
        ev: MessageEvent,
        dedup_kind: &str,
        mentioned: bool,
    ) -> RouteOutcome {
        if self.is_from_bot(&ev) {
            return RouteOutcome::Skipped(SkipReason::BotAuthored);
        }
        if !mentioned {
            return RouteOutcome::Skipped(SkipReason::NoMention);
        }
        if self.dedup.seen_before(dedup_kind, &ev.event_ts) {
            return RouteOutcome::Skipped(SkipReason::Duplicate);
        }

        info!(
            channel_id = %ev.channel_id,
            user_id = %ev.user_id,
            thread_ts = ?ev.thread_ts,
            text = %preview(&ev.text),
            "Processing message"
        );
        self.reply(ev).await
    }

    async fn reply(&self, ev: MessageEvent) -> RouteOutcome {
        let marker = self.config.processing_reaction.as_str();
        if let Err(e) = self.platform.add_reaction(&ev.channel_id, &ev.ts, marker).await {
            warn!(error = %e, channel_id = %ev.channel_id, "Failed to add processing reaction");
        }

        let user_name = match self.platform.user_name(&ev.user_id).await {
            Ok(name) => name,
            Err(e) => {
                debug!(error = %e, user_id = %ev.user_id, "Failed to look up user name");
                UNKNOWN_USER.to_string()
            }
        };

        let mut window = self
            .context
            .build_or_empty(&ev.channel_id, ev.thread_ts.as_deref())
            .await;
        // The source message is already in history; it goes last as the new input.
        window.remove_ts(&ev.ts);

        let mut new_message = ConversationMessage::user(
            strip_mention(&ev.text, self.platform.bot_user_id()),
            Author::new(ev.user_id.clone(), user_name),
        );
        new_message.ts = Some(ev.ts.clone());

        let reply = self.composer.compose(&window, &new_message).await;

        let thread_ts = self.reply_thread_ts(&ev);
        let posted = match self
            .platform
            .post_message(&ev.channel_id, &reply, thread_ts.as_deref())
            .await
        {
            Ok(ts) => {
                debug!(channel_id = %ev.channel_id, reply_ts = %ts, "Posted reply");
                true
            }
            Err(e) => {
                warn!(error = %e, channel_id = %ev.channel_id, "Failed to post reply");
                false
            }
        };

        if let Err(e) = self.platform.remove_reaction(&ev.channel_id, &ev.ts, marker).await {
            warn!(error = %e, channel_id = %ev.channel_id, "Failed to remove processing reaction");
        }

        RouteOutcome::Replied {
            channel_id: ev.channel_id,
            thread_ts,
            posted,
        }
    }

    async fn capture(&self, ev: &MessageEvent) {
        let Some(capture) = self.capture.as_ref() else {
            return;
        };
        if self.dedup.seen_before(CAPTURE_KIND, &ev.event_ts) {
            return;
        }
        capture.capture(ev).await;
    }

    /// Thread to reply into: the source thread, a new thread under the
    /// source message when configured, or the channel itself.
    fn reply_thread_ts(&self, ev: &MessageEvent) -> Option<String> {
        match ev.thread_ts {
            Some(ref ts) => Some(ts.clone()),
            None if self.config.thread_replies => Some(ev.ts.clone()),
            None => None,
        }
    }

    fn is_from_bot(&self, ev: &MessageEvent) -> bool {
        ev.is_bot_authored() || ev.user_id == self.platform.bot_user_id()
    }

    fn mentions_agent(&self, text: &str) -> bool {
        text.contains(&mention_marker(self.platform.bot_user_id()))
    }
}

/// The platform's mention syntax for a user id.
pub fn mention_marker(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

/// Remove every mention of `user_id` from `text`.
pub fn strip_mention(text: &str, user_id: &str) -> String {
    text.replace(&mention_marker(user_id), "").trim().to_string()
}

/// First 50 characters of `text`, for logs.
fn preview(text: &str) -> String {
    const MAX: usize = 50;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
