//! `subscribeConversation` / `unsubscribeConversation` handlers

use super::HandlerResult;
use crate::connection::Connection;
use crate::server::HubState;
use chat_core::{ConversationId, UserId};
use std::sync::Arc;

/// Tracks which conversation a session is viewing
pub struct SubscriptionHandler;

impl SubscriptionHandler {
    /// Record the conversation a session is viewing
    pub fn subscribe(
        state: &HubState,
        connection: &Arc<Connection>,
        user_id: UserId,
        conversation: ConversationId,
    ) -> HandlerResult<()> {
        if state.registry().set_viewing(user_id, connection, conversation) {
            tracing::debug!(
                user_id = %user_id,
                conversation_id = %conversation,
                "Viewing conversation"
            );
        } else {
            tracing::debug!(
                session_id = %connection.session_id(),
                "Ignoring subscribe from replaced session"
            );
        }
        Ok(())
    }

    /// Clear the conversation a session is viewing
    pub fn unsubscribe(
        state: &HubState,
        connection: &Arc<Connection>,
        user_id: UserId,
    ) -> HandlerResult<()> {
        if state.registry().clear_viewing(user_id, connection) {
            tracing::debug!(user_id = %user_id, "Stopped viewing conversation");
        }
        Ok(())
    }
}
