//! Chat message record - the committed row the API layer hands to the hub

use serde::{Deserialize, Serialize};

use crate::value_objects::{ConversationId, MessageId, UserId};

/// A message exactly as it was persisted.
///
/// The hub never interprets message content. The record is forwarded to every
/// connected participant (the sender included) so clients can reconcile their
/// optimistic local copies against what storage actually committed. Columns the
/// hub does not know about are preserved in `extra` and forwarded unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    pub content: String,
    /// Storage timestamp, passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatMessage {
    /// Create a new message record
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            sender_username: None,
            content: content.into(),
            timestamp: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the sender's display name
    #[must_use]
    pub fn with_sender_username(mut self, username: impl Into<String>) -> Self {
        self.sender_username = Some(username.into());
        self
    }

    /// Set the storage timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}
