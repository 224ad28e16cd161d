//! Hub → client events

use chat_core::{ChatMessage, ConversationId, UserId};
use serde::{Deserialize, Serialize};

/// Presence status carried by `presenceUpdate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// An event pushed to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    PresenceUpdate {
        user_id: UserId,
        status: PresenceStatus,
    },
    PresenceSnapshot {
        online_user_ids: Vec<UserId>,
    },
    TypingUpdate {
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    },
    NewMessage {
        message: ChatMessage,
    },
    UserBlocked {
        blocker_id: UserId,
    },
    UserUnblocked {
        blocker_id: UserId,
    },
    AddedToGroup {
        conversation_id: ConversationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_name: Option<String>,
    },
    RemovedFromGroup {
        conversation_id: ConversationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_name: Option<String>,
    },
    ParticipantLeftGroup {
        conversation_id: ConversationId,
        user_id: UserId,
    },
    Error {
        message: String,
    },
    Pong,
}

impl ServerEvent {
    /// Create a presence delta
    #[must_use]
    pub fn presence(user_id: UserId, status: PresenceStatus) -> Self {
        Self::PresenceUpdate { user_id, status }
    }

    /// Create an error event
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of this event, for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PresenceUpdate { .. } => "presenceUpdate",
            Self::PresenceSnapshot { .. } => "presenceSnapshot",
            Self::TypingUpdate { .. } => "typingUpdate",
            Self::NewMessage { .. } => "newMessage",
            Self::UserBlocked { .. } => "userBlocked",
            Self::UserUnblocked { .. } => "userUnblocked",
            Self::AddedToGroup { .. } => "addedToGroup",
            Self::RemovedFromGroup { .. } => "removedFromGroup",
            Self::ParticipantLeftGroup { .. } => "participantLeftGroup",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }
}
