//! Incoming update types and the accessors dispatch relies on.

use serde::{Deserialize, Serialize};

/// A Telegram user, as attached to messages and callback queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// An incoming message. Only the fields dispatch cares about are decoded;
/// everything else on the wire is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// One event from the update feed.
///
/// The wire format carries many update types; dispatch only distinguishes
/// messages and callback queries, everything else decodes to
/// [`UpdateKind::Unsupported`] and is skipped by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawUpdate")]
pub struct Update {
    pub id: i64,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    CallbackQuery(CallbackQuery),
    Unsupported,
}

/// Mirror of the wire shape: `getUpdates` returns an object with
/// `update_id` plus at most one of the payload fields set.
#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        let kind = if let Some(message) = raw.message {
            UpdateKind::Message(message)
        } else if let Some(query) = raw.callback_query {
            UpdateKind::CallbackQuery(query)
        } else {
            UpdateKind::Unsupported
        };
        Update {
            id: raw.update_id,
            kind,
        }
    }
}

impl Update {
    /// The chat a reply should target: the message's chat, or the chat of
    /// the message the callback originated from.
    pub fn chat_id(&self) -> Option<i64> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m.chat.id),
            UpdateKind::CallbackQuery(q) => q.message.as_ref().map(|m| m.chat.id),
            UpdateKind::Unsupported => None,
        }
    }

    /// The acting user: message sender or callback presser.
    pub fn from(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m) => m.from.as_ref(),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::Unsupported => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.from().map(|u| u.id)
    }

    /// The message body, if this update is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Message(m) => m.text.as_deref(),
            _ => None,
        }
    }

    /// The opaque payload attached to a callback update.
    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => q.data.as_deref(),
            _ => None,
        }
    }
}
