//! Client → hub intents
//!
//! Every inbound text frame is one JSON object tagged by `type`. Decoding
//! happens once, here; an unknown `type` or a missing field is a decode error.

use chat_core::{ConversationId, UserId};
use serde::Deserialize;

/// An intent sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientIntent {
    /// Must be the first intent on a connection
    Authenticate {
        user_id: UserId,
        #[serde(rename = "token")]
        credential: String,
    },
    /// Start viewing a conversation
    SubscribeConversation { conversation_id: ConversationId },
    /// Stop viewing the current conversation
    UnsubscribeConversation,
    /// Typing indicator for a conversation
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },
    /// Keepalive
    Ping,
}

impl ClientIntent {
    /// Decode an intent from a text frame
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of this intent, for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::SubscribeConversation { .. } => "subscribeConversation",
            Self::UnsubscribeConversation => "unsubscribeConversation",
            Self::Typing { .. } => "typing",
            Self::Ping => "ping",
        }
    }
}
