// ABOUTME: Inbound webhook envelope decoding into a closed event variant type.
// ABOUTME: Every platform event kind maps to exactly one InboundEvent case.

use crate::error::Result;
use serde::Deserialize;
use serde_json::Value;

/// A message-shaped event: mention, plain message, or edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEvent {
    /// Platform-assigned event timestamp, used for deduplication.
    pub event_ts: String,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    /// Timestamp of the message itself.
    pub ts: String,
    pub thread_ts: Option<String>,
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// True if the bot-origin marker is set on this message.
    pub fn is_bot_authored(&self) -> bool {
        self.bot_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// A reaction added to some message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionEvent {
    pub event_ts: String,
    /// User who added the reaction.
    pub user_id: String,
    pub reaction: String,
    pub item_channel: String,
    pub item_ts: String,
    /// Author of the reacted-to message.
    pub item_user: Option<String>,
}

/// Decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    UrlChallenge { challenge: String },
    AppMention(MessageEvent),
    PlainMessage(MessageEvent),
    MessageEdited(MessageEvent),
    ReactionAdded(ReactionEvent),
    /// Any envelope or event type the pipeline does not act on.
    Unsupported { kind: String },
}

impl InboundEvent {
    /// Event kind name, as used in dedup keys and logs.
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::UrlChallenge { .. } => "url_verification",
            InboundEvent::AppMention(_) => "app_mention",
            InboundEvent::PlainMessage(_) => "message",
            InboundEvent::MessageEdited(_) => "message_changed",
            InboundEvent::ReactionAdded(_) => "reaction_added",
            InboundEvent::Unsupported { kind } => kind,
        }
    }
}

/// One webhook delivery: the decoded event plus the envelope's legacy
/// verification token, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub token: Option<String>,
    pub event: InboundEvent,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    UrlVerification {
        #[serde(default)]
        token: Option<String>,
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        token: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    event_ts: String,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    message: Option<Box<RawMessage>>,
}

impl RawMessage {
    fn into_event(self) -> MessageEvent {
        MessageEvent {
            event_ts: self.event_ts,
            channel_id: self.channel,
            user_id: self.user.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            ts: self.ts,
            thread_ts: self.thread_ts.filter(|ts| !ts.is_empty()),
            bot_id: self.bot_id,
        }
    }

    /// For `message_changed`, the edited message is nested; channel and
    /// event_ts come from the outer event.
    fn into_edited_event(self) -> Option<MessageEvent> {
        let inner = self.message?;
        let mut event = inner.into_event();
        event.channel_id = self.channel;
        event.event_ts = self.event_ts;
        Some(event)
    }
}

#[derive(Debug, Deserialize)]
struct RawReactionItem {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
}

#[derive(Debug, Deserialize)]
struct RawReaction {
    #[serde(default)]
    user: String,
    reaction: String,
    #[serde(default)]
    item_user: Option<String>,
    item: RawReactionItem,
    #[serde(default)]
    event_ts: String,
}

/// Decode a raw webhook body.
///
/// Returns an error only when the body is not a recognisable envelope at
/// all; unknown envelope or event types decode to
/// [`InboundEvent::Unsupported`].
pub fn decode(body: &[u8]) -> Result<Delivery> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    match envelope {
        Envelope::UrlVerification { token, challenge } => Ok(Delivery {
            token,
            event: InboundEvent::UrlChallenge { challenge },
        }),
        Envelope::EventCallback { token, event } => Ok(Delivery {
            token,
            event: decode_event(event)?,
        }),
        Envelope::Other => Ok(Delivery {
            token: None,
            event: InboundEvent::Unsupported {
                kind: "envelope".to_string(),
            },
        }),
    }
}

fn decode_event(event: Value) -> Result<InboundEvent> {
    let kind = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let decoded = match kind.as_str() {
        "app_mention" => {
            let raw: RawMessage = serde_json::from_value(event)?;
            InboundEvent::AppMention(raw.into_event())
        }
        "message" => {
            let raw: RawMessage = serde_json::from_value(event)?;
            let subtype = raw.subtype.clone();
            match subtype.as_deref() {
                None => InboundEvent::PlainMessage(raw.into_event()),
                Some("message_changed") => match raw.into_edited_event() {
                    Some(edited) => InboundEvent::MessageEdited(edited),
                    None => InboundEvent::Unsupported {
                        kind: "message/message_changed".to_string(),
                    },
                },
                Some(other) => InboundEvent::Unsupported {
                    kind: format!("message/{}", other),
                },
            }
        }
        "reaction_added" => {
            let raw: RawReaction = serde_json::from_value(event)?;
            InboundEvent::ReactionAdded(ReactionEvent {
                event_ts: raw.event_ts,
                user_id: raw.user,
                reaction: raw.reaction,
                item_channel: raw.item.channel,
                item_ts: raw.item.ts,
                item_user: raw.item_user.filter(|u| !u.is_empty()),
            })
        }
        _ => InboundEvent::Unsupported { kind: kind.clone() },
    };
    Ok(decoded)
}
