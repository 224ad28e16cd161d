//! Typing relay
//!
//! Best-effort fan-out of typing signals. Nothing is stored: indicators expire
//! on the clients, driven by their own refresh and clear signals.

use crate::connection::{DeliveryReport, SessionRegistry};
use crate::protocol::ServerEvent;
use chat_core::{ConversationId, DomainError, ParticipantView, UserId};
use std::sync::Arc;

/// Relays typing indicators to a conversation's other participants
pub struct TypingRelay {
    registry: Arc<SessionRegistry>,
    participants: Arc<dyn ParticipantView>,
}

impl TypingRelay {
    /// Create a new relay
    pub fn new(registry: Arc<SessionRegistry>, participants: Arc<dyn ParticipantView>) -> Self {
        Self {
            registry,
            participants,
        }
    }

    /// Push `typingUpdate` to every connected participant of `conversation` except `sender`
    ///
    /// # Errors
    /// Returns the lookup failure if participants could not be resolved
    pub async fn relay(
        &self,
        sender: UserId,
        conversation: ConversationId,
        is_typing: bool,
    ) -> Result<DeliveryReport, DomainError> {
        let recipients = self.participants.get(conversation, Some(sender)).await?;

        let report = self.registry.send_to_users(
            &recipients,
            &ServerEvent::TypingUpdate {
                conversation_id: conversation,
                user_id: sender,
                is_typing,
            },
        );

        tracing::trace!(
            user_id = %sender,
            conversation_id = %conversation,
            is_typing,
            sent = report.sent,
            skipped = report.skipped,
            "Typing relayed"
        );

        Ok(report)
    }
}

impl std::fmt::Debug for TypingRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingRelay").finish_non_exhaustive()
    }
}
