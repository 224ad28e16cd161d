//! `authenticate` handler

use super::{HandlerError, HandlerResult};
use crate::connection::{Connection, ConnectionState};
use crate::server::HubState;
use chat_core::UserId;
use std::sync::Arc;

/// Handles the handshake
pub struct AuthenticateHandler;

impl AuthenticateHandler {
    /// Verify the credential and bring the session online
    pub async fn handle(
        state: &HubState,
        connection: &Arc<Connection>,
        claimed: UserId,
        credential: &str,
    ) -> HandlerResult<()> {
        let user_id = state
            .verifier()
            .verify(claimed, credential)
            .await
            .map_err(|e| {
                tracing::warn!(
                    session_id = %connection.session_id(),
                    claimed = %claimed,
                    error = %e,
                    "Authentication failed"
                );
                HandlerError::AuthenticationFailed(e)
            })?;

        match connection.mark_authenticated(user_id) {
            Ok(()) => {}
            Err(ConnectionState::Closed) => {
                tracing::debug!(
                    session_id = %connection.session_id(),
                    "Connection closed during authentication"
                );
                return Ok(());
            }
            Err(_) => return Err(HandlerError::AlreadyAuthenticated),
        }

        let outcome = state.presence().join(user_id, connection);

        tracing::info!(
            session_id = %connection.session_id(),
            user_id = %user_id,
            superseded = outcome.evicted.is_some(),
            online = outcome.snapshot.len() + 1,
            "User authenticated"
        );

        Ok(())
    }
}
