// ABOUTME: Conversation data model and role inference for historical messages.
// ABOUTME: Maps raw platform history records into ordered conversation windows.

use serde::{Deserialize, Serialize};

/// Subtype the platform assigns to messages posted by integrations.
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// Who produced a message, from the model's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Platform identity attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A raw message as returned by the chat platform's history or replies APIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryMessage {
    pub ts: String,
    pub thread_ts: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    pub text: String,
}

impl HistoryMessage {
    /// True when the message is a thread parent or reply.
    ///
    /// Such messages are only surfaced through their own thread fetch.
    pub fn belongs_to_thread(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|ts| !ts.is_empty())
    }

    /// The thread this message lives in, or its own ts when it has none.
    pub fn thread_anchor(&self) -> &str {
        match self.thread_ts.as_deref() {
            Some(ts) if !ts.is_empty() => ts,
            _ => &self.ts,
        }
    }
}

/// Classify a historical message as human or agent-originated.
///
/// A bot identifier and the `bot_message` subtype are treated as equally
/// authoritative; either one marks the message as the assistant's.
pub fn infer_role(message: &HistoryMessage) -> Role {
    let has_bot_id = message.bot_id.as_deref().is_some_and(|id| !id.is_empty());
    let bot_subtype = message.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE);
    if has_bot_id || bot_subtype {
        Role::Assistant
    } else {
        Role::User
    }
}

/// One entry of a conversation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub author: Option<Author>,
    /// Platform timestamp, when the message came from history.
    pub ts: Option<String>,
}

impl ConversationMessage {
    /// A fresh human message that has not been posted to history yet.
    pub fn user(content: impl Into<String>, author: Author) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            author: Some(author),
            ts: None,
        }
    }

    /// Render as `{authorId}|{authorName}: {content}` for flattened transcripts.
    pub fn transcript_line(&self) -> String {
        let (id, name) = self
            .author
            .as_ref()
            .map(|a| (a.id.as_str(), a.name.as_str()))
            .unwrap_or(("", ""));
        format!("{}|{}: {}", id, name, self.content)
    }
}

impl From<&HistoryMessage> for ConversationMessage {
    fn from(msg: &HistoryMessage) -> Self {
        Self {
            role: infer_role(msg),
            content: msg.text.clone(),
            author: Some(Author {
                id: msg.user_id.clone().unwrap_or_default(),
                name: msg.username.clone().unwrap_or_default(),
            }),
            ts: Some(msg.ts.clone()),
        }
    }
}

/// Chronologically ascending sequence of conversation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationWindow {
    messages: Vec<ConversationMessage>,
}

impl ConversationWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    /// Drop every entry carrying the given platform timestamp.
    pub fn remove_ts(&mut self, ts: &str) {
        self.messages.retain(|m| m.ts.as_deref() != Some(ts));
    }

    /// Like [`remove_ts`](Self::remove_ts), returning the first removed entry.
    pub fn take_ts(&mut self, ts: &str) -> Option<ConversationMessage> {
        let index = self.messages.iter().position(|m| m.ts.as_deref() == Some(ts))?;
        let taken = self.messages.remove(index);
        self.remove_ts(ts);
        Some(taken)
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConversationMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }
}

impl<'a> IntoIterator for &'a ConversationWindow {
    type Item = &'a ConversationMessage;
    type IntoIter = std::slice::Iter<'a, ConversationMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
