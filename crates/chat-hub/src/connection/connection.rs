//! Individual WebSocket connection
//!
//! The handle the registry stores for a live socket. Writes go through a
//! bounded outbound queue drained by the connection's writer task, so every
//! send from the hub is non-blocking.

use crate::protocol::{CloseCode, ServerEvent};
use chat_core::UserId;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// Handshake state of a connection
///
/// `Unauthenticated → Authenticated → Closed`, or straight to `Closed`.
/// There is no way back out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection established, waiting for `authenticate`
    Unauthenticated,
    /// Bound to a verified identity
    Authenticated(UserId),
    /// Closed or closing; further intents are ignored
    Closed,
}

/// Item on a connection's outbound queue
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    /// Send a close frame and stop writing
    Close(CloseCode),
}

/// Why an event was not queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection is closed")]
    Closed,
    #[error("outbound queue is full")]
    Full,
}

/// A single WebSocket connection
pub struct Connection {
    /// Unique session ID
    session_id: String,

    /// Handshake state
    state: RwLock<ConnectionState>,

    /// Channel to the writer task
    sender: mpsc::Sender<Outbound>,

    /// Close code to use when the queue could not take the close itself
    pending_close: Mutex<Option<CloseCode>>,

    /// Wakes the writer for a close that bypassed the queue
    close_signal: Notify,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(session_id: String, sender: mpsc::Sender<Outbound>) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            state: RwLock::new(ConnectionState::Unauthenticated),
            sender,
            pending_close: Mutex::new(None),
            close_signal: Notify::new(),
            created_at: Instant::now(),
        })
    }

    /// Generate a new session ID
    #[must_use]
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Get the session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Get the user ID (if authenticated)
    pub fn user_id(&self) -> Option<UserId> {
        match self.state() {
            ConnectionState::Authenticated(user_id) => Some(user_id),
            _ => None,
        }
    }

    /// Check if the connection is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.user_id().is_some()
    }

    /// Check if the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed || self.sender.is_closed()
    }

    /// Bind the connection to a verified identity
    ///
    /// Only succeeds from `Unauthenticated`; returns the state that prevented it otherwise.
    pub fn mark_authenticated(&self, user_id: UserId) -> Result<(), ConnectionState> {
        let mut state = self.state.write();
        match *state {
            ConnectionState::Unauthenticated => {
                *state = ConnectionState::Authenticated(user_id);
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Move to `Closed`, returning the previous state
    pub fn mark_closed(&self) -> ConnectionState {
        std::mem::replace(&mut *self.state.write(), ConnectionState::Closed)
    }

    /// Queue an event for this connection without waiting
    pub fn send_event(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        if self.state() == ConnectionState::Closed {
            return Err(DeliveryError::Closed);
        }

        self.sender
            .try_send(Outbound::Event(event))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Close the connection with a hub close code
    ///
    /// Events already queued are flushed before the close frame. If the queue
    /// is full the writer is signalled directly and stops without flushing.
    /// Only the first close code is kept.
    pub fn close(&self, code: CloseCode) {
        self.mark_closed();

        {
            let mut pending = self.pending_close.lock();
            if pending.is_some() {
                return;
            }
            *pending = Some(code);
        }

        if self.sender.try_send(Outbound::Close(code)).is_err() {
            self.close_signal.notify_one();
        }
    }

    /// Stop the writer without a hub close code (peer went away)
    pub fn shutdown(&self) {
        self.mark_closed();
        self.close_signal.notify_one();
    }

    /// Wait until a close bypassing the queue is requested
    pub async fn close_requested(&self) {
        self.close_signal.notified().await;
    }

    /// Close code recorded by `close`, if any
    pub fn close_code(&self) -> Option<CloseCode> {
        *self.pending_close.lock()
    }

    /// Get connection age
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}
