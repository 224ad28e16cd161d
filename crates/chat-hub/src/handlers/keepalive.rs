//! `ping` handler

use super::HandlerResult;
use crate::connection::Connection;
use crate::protocol::ServerEvent;

/// Answers client pings
pub struct PingHandler;

impl PingHandler {
    /// Reply with `pong`
    pub fn handle(connection: &Connection) -> HandlerResult<()> {
        if let Err(e) = connection.send_event(ServerEvent::Pong) {
            tracing::warn!(
                session_id = %connection.session_id(),
                error = %e,
                "Failed to queue pong"
            );
        }
        Ok(())
    }
}
