use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Attachment, ChannelId, GuildId, MessageId, User};

/// An inbound platform event that may carry a command invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default = "Uuid::new_v4")]
    pub event_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub caller: User,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
    pub payload: InvocationPayload,
}

impl InvocationEvent {
    /// The message that triggered this event, when the event came from a chat message.
    pub fn message_id(&self) -> Option<MessageId> {
        match &self.payload {
            InvocationPayload::Text { message_id, .. } => Some(*message_id),
            InvocationPayload::Slash { .. } => None,
        }
    }

    pub fn style(&self) -> InvocationStyle {
        match self.payload {
            InvocationPayload::Text { .. } => InvocationStyle::Text,
            InvocationPayload::Slash { .. } => InvocationStyle::Slash,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InvocationPayload {
    Text {
        message_id: MessageId,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
    Slash {
        path: Vec<String>,
        #[serde(default)]
        options: HashMap<String, SlotValue>,
        #[serde(default)]
        attachments: HashMap<String, Attachment>,
    },
}

/// A typed option value delivered by a slash-style interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SlotValue {
    /// Raw textual form, used when a typed slot feeds a text-based parser.
    pub fn as_raw(&self) -> String {
        match self {
            SlotValue::Boolean(v) => v.to_string(),
            SlotValue::Integer(v) => v.to_string(),
            SlotValue::Float(v) => v.to_string(),
            SlotValue::Text(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStyle {
    Text,
    Slash,
}

impl InvocationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStyle::Text => "text",
            InvocationStyle::Slash => "slash",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedColor {
    Green,
    Red,
    Gray,
    White,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: String,
    pub color: EmbedColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    #[serde(default)]
    pub private: bool,
}

impl ReplySpec {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn privately(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

/// Outbound record emitted by a reply transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ReplyEvent {
    Sent {
        channel_id: ChannelId,
        message_id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<MessageId>,
        spec: ReplySpec,
    },
    Edited {
        channel_id: ChannelId,
        message_id: MessageId,
        spec: ReplySpec,
    },
    Deleted {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    Reacted {
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: String,
    },
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
