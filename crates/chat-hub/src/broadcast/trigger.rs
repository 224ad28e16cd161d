//! External trigger interface
//!
//! The API layer calls these after a durable write commits. Each call is a
//! one-way, non-blocking send onto the dispatcher's bounded queue. Delivery is
//! at most once and the caller never learns who received what.

use chat_core::{ChatMessage, ConversationId, UserId};
use thiserror::Error;
use tokio::sync::mpsc;

/// A committed write the hub should fan out
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    NewMessage {
        message: ChatMessage,
        sender: UserId,
    },
    Block {
        blocker: UserId,
        blocked: UserId,
    },
    Unblock {
        blocker: UserId,
        unblocked: UserId,
    },
    GroupMemberAdded {
        conversation: ConversationId,
        added: UserId,
        group_name: Option<String>,
    },
    GroupMemberRemoved {
        conversation: ConversationId,
        removed: UserId,
        group_name: Option<String>,
    },
}

impl Trigger {
    /// Short name for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::Block { .. } => "block",
            Self::Unblock { .. } => "unblock",
            Self::GroupMemberAdded { .. } => "group_member_added",
            Self::GroupMemberRemoved { .. } => "group_member_removed",
        }
    }
}

/// Why a trigger was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("hub dispatcher queue is full")]
    Full,

    #[error("hub dispatcher is not running")]
    Stopped,
}

/// Receiving half, consumed by [`super::EventDispatcher::start`]
pub type TriggerReceiver = mpsc::Receiver<Trigger>;

/// Sending half handed to the API layer
#[derive(Debug, Clone)]
pub struct HubTriggers {
    tx: mpsc::Sender<Trigger>,
}

/// Create a trigger channel holding at most `capacity` queued triggers
#[must_use]
pub fn trigger_channel(capacity: usize) -> (HubTriggers, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (HubTriggers { tx }, rx)
}

impl HubTriggers {
    /// Queue a trigger without waiting for room
    pub fn send(&self, trigger: Trigger) -> Result<(), TriggerError> {
        let kind = trigger.kind();
        self.tx.try_send(trigger).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!(trigger = kind, "Dropping trigger, dispatcher queue full");
                TriggerError::Full
            }
            mpsc::error::TrySendError::Closed(_) => {
                tracing::warn!(trigger = kind, "Dropping trigger, dispatcher stopped");
                TriggerError::Stopped
            }
        })
    }

    /// A message was stored in `message.conversation_id`
    pub fn on_new_message(&self, message: ChatMessage, sender: UserId) -> Result<(), TriggerError> {
        self.send(Trigger::NewMessage { message, sender })
    }

    /// `blocker` blocked `blocked`
    pub fn on_block(&self, blocker: UserId, blocked: UserId) -> Result<(), TriggerError> {
        self.send(Trigger::Block { blocker, blocked })
    }

    /// `blocker` unblocked `unblocked`
    pub fn on_unblock(&self, blocker: UserId, unblocked: UserId) -> Result<(), TriggerError> {
        self.send(Trigger::Unblock { blocker, unblocked })
    }

    /// `added` joined group `conversation`
    pub fn on_group_member_added(
        &self,
        conversation: ConversationId,
        added: UserId,
        group_name: Option<String>,
    ) -> Result<(), TriggerError> {
        self.send(Trigger::GroupMemberAdded {
            conversation,
            added,
            group_name,
        })
    }

    /// `removed` left or was removed from group `conversation`
    pub fn on_group_member_removed(
        &self,
        conversation: ConversationId,
        removed: UserId,
        group_name: Option<String>,
    ) -> Result<(), TriggerError> {
        self.send(Trigger::GroupMemberRemoved {
            conversation,
            removed,
            group_name,
        })
    }

    /// Check if the dispatcher is still consuming triggers
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
