//! Intent handlers
//!
//! [`IntentDispatcher`] is the per-connection handshake state machine: it
//! decides from the connection's state whether an intent is allowed and
//! routes it to its handler.

mod authenticate;
mod error;
mod keepalive;
mod subscription;
mod typing;

pub use authenticate::AuthenticateHandler;
pub use error::{
    HandlerError, HandlerResult, AUTHENTICATION_FAILED_MESSAGE, PROCESSING_FAILED_MESSAGE,
};
pub use keepalive::PingHandler;
pub use subscription::SubscriptionHandler;
pub use typing::TypingHandler;

use crate::connection::{Connection, ConnectionState};
use crate::protocol::ClientIntent;
use crate::server::HubState;
use std::sync::Arc;

/// Dispatch decoded intents to the appropriate handlers
pub struct IntentDispatcher;

impl IntentDispatcher {
    /// Handle an intent in the context of the connection's handshake state
    pub async fn dispatch(
        state: &HubState,
        connection: &Arc<Connection>,
        intent: ClientIntent,
    ) -> HandlerResult<()> {
        match (connection.state(), intent) {
            (ConnectionState::Closed, intent) => {
                tracing::trace!(
                    session_id = %connection.session_id(),
                    intent = intent.kind(),
                    "Ignoring intent on closed connection"
                );
                Ok(())
            }

            (
                ConnectionState::Unauthenticated,
                ClientIntent::Authenticate {
                    user_id,
                    credential,
                },
            ) => AuthenticateHandler::handle(state, connection, user_id, &credential).await,

            (ConnectionState::Unauthenticated, intent) => {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    intent = intent.kind(),
                    "Intent before authentication"
                );
                Err(HandlerError::NotAuthenticated)
            }

            (ConnectionState::Authenticated(user_id), ClientIntent::Authenticate { .. }) => {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    user_id = %user_id,
                    "Client sent authenticate while already authenticated"
                );
                Err(HandlerError::AlreadyAuthenticated)
            }

            (
                ConnectionState::Authenticated(user_id),
                ClientIntent::SubscribeConversation { conversation_id },
            ) => SubscriptionHandler::subscribe(state, connection, user_id, conversation_id),

            (ConnectionState::Authenticated(user_id), ClientIntent::UnsubscribeConversation) => {
                SubscriptionHandler::unsubscribe(state, connection, user_id)
            }

            (
                ConnectionState::Authenticated(user_id),
                ClientIntent::Typing {
                    conversation_id,
                    is_typing,
                },
            ) => TypingHandler::handle(state, user_id, conversation_id, is_typing).await,

            (ConnectionState::Authenticated(_), ClientIntent::Ping) => {
                PingHandler::handle(connection)
            }
        }
    }
}
