//! `typing` handler

use super::HandlerResult;
use crate::server::HubState;
use chat_core::{ConversationId, UserId};

/// Forwards typing signals to the typing relay
pub struct TypingHandler;

impl TypingHandler {
    /// Relay a typing signal if the sender is viewing a conversation
    pub async fn handle(
        state: &HubState,
        user_id: UserId,
        conversation: ConversationId,
        is_typing: bool,
    ) -> HandlerResult<()> {
        if state.registry().viewing(user_id).is_none() {
            tracing::debug!(
                user_id = %user_id,
                conversation_id = %conversation,
                "Ignoring typing signal outside a conversation view"
            );
            return Ok(());
        }

        state.typing().relay(user_id, conversation, is_typing).await?;
        Ok(())
    }
}
