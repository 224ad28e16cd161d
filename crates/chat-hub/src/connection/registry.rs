//! Session registry
//!
//! Authoritative table of which identity owns which live connection, and which
//! conversation that session is viewing. Entries are keyed by identity, so the
//! table holds at most one session per identity by construction.
//!
//! Each operation is atomic for its key. Sequencing membership changes with the
//! presence events they cause is the job of [`crate::presence::PresenceTracker`],
//! which is the only writer of membership.

use super::{Connection, DeliveryError};
use crate::protocol::ServerEvent;
use chat_core::{ConversationId, UserId};
use dashmap::DashMap;
use std::sync::Arc;

/// A registered, authenticated session
#[derive(Debug, Clone)]
struct SessionEntry {
    connection: Arc<Connection>,
    viewing: Option<ConversationId>,
}

/// Outcome of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Events queued on a live connection
    pub sent: usize,
    /// Recipients not connected, or whose connection refused the event
    pub skipped: usize,
}

impl DeliveryReport {
    /// Combine two reports
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            sent: self.sent + other.sent,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Manages all authenticated sessions
///
/// Uses `DashMap` for concurrent access to session state.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Sessions by identity
    sessions: DashMap<UserId, SessionEntry>,
}

impl SessionRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `connection` as the session for `user_id`
    ///
    /// Replaces any existing entry and returns the evicted connection when it
    /// was a different one. The caller is responsible for closing it.
    pub fn register(&self, user_id: UserId, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let previous = self.sessions.insert(
            user_id,
            SessionEntry {
                connection: connection.clone(),
                viewing: None,
            },
        )?;

        if Arc::ptr_eq(&previous.connection, &connection) {
            None
        } else {
            Some(previous.connection)
        }
    }

    /// Get the live connection for an identity
    pub fn lookup(&self, user_id: UserId) -> Option<Arc<Connection>> {
        self.sessions
            .get(&user_id)
            .map(|entry| entry.connection.clone())
    }

    /// Remove the session for `user_id` if `connection` is still the registered one
    ///
    /// Returns true if an entry was removed.
    pub fn remove(&self, user_id: UserId, connection: &Arc<Connection>) -> bool {
        self.sessions
            .remove_if(&user_id, |_, entry| Arc::ptr_eq(&entry.connection, connection))
            .is_some()
    }

    /// Snapshot of online identities
    pub fn list(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        users.sort_unstable();
        users
    }

    /// Snapshot of online identities other than `exclude`
    pub fn list_except(&self, exclude: UserId) -> Vec<UserId> {
        let mut users = self.list();
        users.retain(|user| *user != exclude);
        users
    }

    /// Record the conversation a session is viewing
    ///
    /// Ignored (returns false) unless `connection` is the registered session.
    pub fn set_viewing(
        &self,
        user_id: UserId,
        connection: &Arc<Connection>,
        conversation: ConversationId,
    ) -> bool {
        self.update_viewing(user_id, connection, Some(conversation))
    }

    /// Clear the conversation a session is viewing
    pub fn clear_viewing(&self, user_id: UserId, connection: &Arc<Connection>) -> bool {
        self.update_viewing(user_id, connection, None)
    }

    fn update_viewing(
        &self,
        user_id: UserId,
        connection: &Arc<Connection>,
        viewing: Option<ConversationId>,
    ) -> bool {
        match self.sessions.get_mut(&user_id) {
            Some(mut entry) if Arc::ptr_eq(&entry.connection, connection) => {
                entry.viewing = viewing;
                true
            }
            _ => false,
        }
    }

    /// Get the conversation a session is viewing
    pub fn viewing(&self, user_id: UserId) -> Option<ConversationId> {
        self.sessions.get(&user_id).and_then(|entry| entry.viewing)
    }

    /// Number of online identities
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if nobody is online
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Queue an event for one identity, if connected
    pub fn send_to(&self, user_id: UserId, event: ServerEvent) -> DeliveryReport {
        let Some(connection) = self.lookup(user_id) else {
            tracing::trace!(user_id = %user_id, event = event.kind(), "Recipient not connected");
            return DeliveryReport { sent: 0, skipped: 1 };
        };

        match connection.send_event(event) {
            Ok(()) => DeliveryReport { sent: 1, skipped: 0 },
            Err(e) => {
                log_delivery_failure(&connection, user_id, e);
                DeliveryReport { sent: 0, skipped: 1 }
            }
        }
    }

    /// Queue an event for each listed identity that is connected
    pub fn send_to_users(&self, users: &[UserId], event: &ServerEvent) -> DeliveryReport {
        users.iter().fold(DeliveryReport::default(), |report, user_id| {
            report.merge(self.send_to(*user_id, event.clone()))
        })
    }

    /// Queue an event for every session except `exclude`
    pub fn broadcast_except(&self, exclude: UserId, event: &ServerEvent) -> DeliveryReport {
        // Collect first so no shard lock is held while sending.
        let recipients: Vec<(UserId, Arc<Connection>)> = self
            .sessions
            .iter()
            .filter(|entry| *entry.key() != exclude)
            .map(|entry| (*entry.key(), entry.connection.clone()))
            .collect();

        let mut report = DeliveryReport::default();
        for (user_id, connection) in recipients {
            match connection.send_event(event.clone()) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log_delivery_failure(&connection, user_id, e);
                    report.skipped += 1;
                }
            }
        }
        report
    }
}

fn log_delivery_failure(connection: &Connection, user_id: UserId, error: DeliveryError) {
    tracing::warn!(
        session_id = %connection.session_id(),
        user_id = %user_id,
        error = %error,
        "Skipping delivery to unhealthy connection"
    );
}
