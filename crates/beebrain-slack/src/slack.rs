// ABOUTME: Slack Web API client implementing the pipeline's ChatPlatform seam.
// ABOUTME: Wraps slack-morphism calls for history, replies, posting, and reactions.

use crate::config::SlackConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use beebrain_core::{BrainError, ChatPlatform, HistoryMessage};
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on every individual Slack API call.
const SLACK_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size and page cap when walking a thread with cursors.
const REPLIES_PAGE_LIMIT: u16 = 200;
const MAX_REPLIES_PAGES: usize = 10;

/// Parent plus the target: replies always lead with the thread parent.
const FETCH_MESSAGE_LIMIT: u16 = 2;

/// Slack client wrapper bound to the bot token.
pub struct BeeBrainSlackClient {
    client: Arc<SlackHyperClient>,
    bot_token: SlackApiToken,
    bot_user_id: String,
}

impl BeeBrainSlackClient {
    /// Create a new Slack client and authenticate.
    pub async fn new(config: &SlackConfig) -> Result<Self> {
        info!("Initializing Slack client");

        let connector = SlackClientHyperConnector::new()
            .map_err(|e| BotError::Slack(format!("Failed to create Slack connector: {}", e)))?;
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        let bot_token_value: SlackApiTokenValue = config.bot_token.clone().into();
        let bot_token = SlackApiToken::new(bot_token_value);

        // Test authentication and get bot user ID
        let session = client.open_session(&bot_token);
        let auth_response = bounded("auth.test", session.auth_test())
            .await
            .map_err(|e| BotError::Slack(format!("Auth test failed: {}", e)))?;

        let bot_user_id = auth_response.user_id.0;
        info!(bot_user_id = %bot_user_id, "Slack authentication successful");

        Ok(Self {
            client,
            bot_token,
            bot_user_id,
        })
    }
}

#[async_trait]
impl ChatPlatform for BeeBrainSlackClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn channel_history(
        &self,
        channel_id: &str,
        oldest: &str,
        limit: u16,
    ) -> beebrain_core::Result<Vec<HistoryMessage>> {
        let session = self.client.open_session(&self.bot_token);
        let request = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId::new(channel_id.to_string()))
            .with_oldest(SlackTs::new(oldest.to_string()))
            .with_limit(limit);

        let response = bounded("conversations.history", session.conversations_history(&request)).await?;

        debug!(channel_id = %channel_id, count = response.messages.len(), "Fetched channel history");
        Ok(response.messages.iter().map(to_history_message).collect())
    }

    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> beebrain_core::Result<Vec<HistoryMessage>> {
        let session = self.client.open_session(&self.bot_token);
        let channel = SlackChannelId::new(channel_id.to_string());
        let thread = SlackTs::new(thread_ts.to_string());

        let (messages, unread_cursor) = collect_pages(MAX_REPLIES_PAGES, |cursor| {
            let mut request =
                SlackApiConversationsRepliesRequest::new(channel.clone(), thread.clone())
                    .with_limit(REPLIES_PAGE_LIMIT);
            if let Some(next) = cursor {
                request = request.with_cursor(SlackCursorId::new(next));
            }
            let session = &session;
            async move {
                let response =
                    bounded("conversations.replies", session.conversations_replies(&request))
                        .await?;
                let next = response
                    .response_metadata
                    .and_then(|meta| meta.next_cursor)
                    .map(|next| next.0);
                Ok::<_, BrainError>((
                    response.messages.iter().map(to_history_message).collect(),
                    next,
                ))
            }
        })
        .await?;

        if unread_cursor.is_some() {
            warn!(
                channel_id = %channel_id,
                thread_ts = %thread_ts,
                pages = MAX_REPLIES_PAGES,
                count = messages.len(),
                "Thread exceeds page cap, newest replies omitted from context"
            );
        }

        debug!(
            channel_id = %channel_id,
            thread_ts = %thread_ts,
            count = messages.len(),
            "Fetched thread replies"
        );
        Ok(messages)
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> beebrain_core::Result<Option<HistoryMessage>> {
        // For a thread reply Slack lists the parent first, then the replies
        // inside [oldest, latest]. Pinning both bounds to `ts` leaves only the
        // target after the parent; a top-level message is its own parent.
        let session = self.client.open_session(&self.bot_token);
        let target = SlackTs::new(ts.to_string());
        let request = SlackApiConversationsRepliesRequest::new(
            SlackChannelId::new(channel_id.to_string()),
            target.clone(),
        )
        .with_oldest(target.clone())
        .with_latest(target)
        .with_inclusive(true)
        .with_limit(FETCH_MESSAGE_LIMIT);

        let response = bounded("conversations.replies", session.conversations_replies(&request)).await?;
        let found = find_message(&response.messages, ts);
        if found.is_none() {
            debug!(channel_id = %channel_id, ts = %ts, "Message not found in replies");
        }
        Ok(found)
    }

    async fn user_name(&self, user_id: &str) -> beebrain_core::Result<String> {
        let session = self.client.open_session(&self.bot_token);
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string()));
        let response = bounded("users.info", session.users_info(&request)).await?;

        let user = response.user;
        let profile_name = user
            .profile
            .as_ref()
            .and_then(|p| p.display_name.clone().or_else(|| p.real_name.clone()))
            .filter(|name| !name.trim().is_empty());

        profile_name
            .or(user.name)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| BrainError::Platform(format!("user {} has no name", user_id)))
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> beebrain_core::Result<String> {
        debug!(channel_id = %channel_id, thread_ts = ?thread_ts, "Posting message to Slack");

        let session = self.client.open_session(&self.bot_token);

        let mut request = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(channel_id.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        );

        if let Some(ts) = thread_ts {
            request = request.with_thread_ts(SlackTs::new(ts.to_string()));
        }

        let response = bounded("chat.postMessage", session.chat_post_message(&request)).await?;

        debug!(message_ts = %response.ts, "Message posted successfully");
        Ok(response.ts.0)
    }

    async fn add_reaction(&self, channel_id: &str, ts: &str, name: &str) -> beebrain_core::Result<()> {
        let session = self.client.open_session(&self.bot_token);
        let request = SlackApiReactionsAddRequest::new(
            SlackChannelId::new(channel_id.to_string()),
            SlackReactionName(name.to_string()),
            SlackTs::new(ts.to_string()),
        );
        bounded("reactions.add", session.reactions_add(&request)).await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        ts: &str,
        name: &str,
    ) -> beebrain_core::Result<()> {
        let session = self.client.open_session(&self.bot_token);
        let request = SlackApiReactionsRemoveRequest::new(SlackReactionName(name.to_string()))
            .with_channel(SlackChannelId::new(channel_id.to_string()))
            .with_timestamp(SlackTs::new(ts.to_string()));
        bounded("reactions.remove", session.reactions_remove(&request)).await?;
        Ok(())
    }
}

/// Run one Slack call under [`SLACK_CALL_TIMEOUT`].
async fn bounded<T, F>(operation: &'static str, call: F) -> beebrain_core::Result<T>
where
    F: Future<Output = std::result::Result<T, SlackClientError>>,
{
    match tokio::time::timeout(SLACK_CALL_TIMEOUT, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BrainError::Platform(format!("{} failed: {}", operation, e))),
        Err(_) => Err(BrainError::Timeout { operation }),
    }
}

/// Follow cursors until the platform stops returning one or `max_pages`
/// pages have been read. Returns the items and any cursor left unfollowed.
async fn collect_pages<T, F, Fut>(
    max_pages: usize,
    mut fetch_page: F,
) -> beebrain_core::Result<(Vec<T>, Option<String>)>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = beebrain_core::Result<(Vec<T>, Option<String>)>>,
{
    let mut items = Vec::new();
    let mut cursor = None;

    for _ in 0..max_pages {
        let (page, next) = fetch_page(cursor.take()).await?;
        items.extend(page);
        cursor = next.filter(|next| !next.is_empty());
        if cursor.is_none() {
            break;
        }
    }

    Ok((items, cursor))
}

fn find_message(messages: &[SlackHistoryMessage], ts: &str) -> Option<HistoryMessage> {
    messages
        .iter()
        .find(|msg| msg.origin.ts.0 == ts)
        .map(to_history_message)
}

fn to_history_message(msg: &SlackHistoryMessage) -> HistoryMessage {
    HistoryMessage {
        ts: msg.origin.ts.0.clone(),
        thread_ts: msg.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
        user_id: msg.sender.user.as_ref().map(|u| u.0.clone()),
        username: msg.sender.username.clone(),
        bot_id: msg.sender.bot_id.as_ref().map(|b| b.0.clone()),
        subtype: msg.subtype.as_ref().and_then(subtype_name),
        text: msg.content.text.clone().unwrap_or_default(),
    }
}

/// Wire name of a message subtype, e.g. `bot_message`.
fn subtype_name(subtype: &SlackMessageEventType) -> Option<String> {
    serde_json::to_value(subtype)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
}
