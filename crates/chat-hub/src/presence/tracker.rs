//! Presence tracker
//!
//! Presence is never stored: the online set is the registry's key set. The
//! tracker is the single writer of registry membership and emits exactly one
//! presence delta per registration or removal.

use crate::connection::{Connection, DeliveryReport, SessionRegistry};
use crate::protocol::{CloseCode, PresenceStatus, ServerEvent};
use chat_core::UserId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Result of bringing a session online
#[derive(Debug)]
pub struct JoinOutcome {
    /// Prior connection for the same identity, already closed as superseded
    pub evicted: Option<Arc<Connection>>,
    /// Delivery of the `online` delta to other sessions
    pub announced: DeliveryReport,
    /// Identities listed in the snapshot sent to the new session
    pub snapshot: Vec<UserId>,
}

/// Derives presence from the session registry
#[derive(Debug)]
pub struct PresenceTracker {
    registry: Arc<SessionRegistry>,
    /// Serializes membership changes together with the events they emit.
    /// Never held across an await.
    membership: Mutex<()>,
}

impl PresenceTracker {
    /// Create a tracker over a registry
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            membership: Mutex::new(()),
        }
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register an authenticated session and announce it
    ///
    /// Any prior session for the identity is closed with `Superseded` before
    /// the new one becomes visible to presence broadcasts. Observers receive
    /// one `online` delta; the new session receives one snapshot of everybody
    /// else, queued after its own registration.
    pub fn join(&self, user_id: UserId, connection: &Arc<Connection>) -> JoinOutcome {
        let _guard = self.membership.lock();

        let evicted = self.registry.register(user_id, connection.clone());
        if let Some(previous) = &evicted {
            tracing::warn!(
                user_id = %user_id,
                evicted_session = %previous.session_id(),
                session_id = %connection.session_id(),
                "Identity connected elsewhere, closing previous session"
            );
            previous.close(CloseCode::Superseded);
        }

        let announced = self.registry.broadcast_except(
            user_id,
            &ServerEvent::presence(user_id, PresenceStatus::Online),
        );

        let snapshot = self.registry.list_except(user_id);
        if let Err(e) = connection.send_event(ServerEvent::PresenceSnapshot {
            online_user_ids: snapshot.clone(),
        }) {
            tracing::warn!(
                session_id = %connection.session_id(),
                error = %e,
                "Failed to queue presence snapshot"
            );
        }

        tracing::debug!(
            user_id = %user_id,
            sent = announced.sent,
            skipped = announced.skipped,
            online = snapshot.len() + 1,
            "User online"
        );

        JoinOutcome {
            evicted,
            announced,
            snapshot,
        }
    }

    /// Remove a session and announce the departure
    ///
    /// No-op (returns `None`) unless `connection` is still the registered
    /// session for `user_id`, so closing a superseded connection is silent.
    pub fn leave(&self, user_id: UserId, connection: &Arc<Connection>) -> Option<DeliveryReport> {
        let _guard = self.membership.lock();

        if !self.registry.remove(user_id, connection) {
            tracing::debug!(
                user_id = %user_id,
                session_id = %connection.session_id(),
                "Session already replaced, skipping offline update"
            );
            return None;
        }

        let report = self.registry.broadcast_except(
            user_id,
            &ServerEvent::presence(user_id, PresenceStatus::Offline),
        );

        tracing::debug!(
            user_id = %user_id,
            sent = report.sent,
            skipped = report.skipped,
            "User offline"
        );

        Some(report)
    }

    /// Current online identities
    pub fn online(&self) -> Vec<UserId> {
        self.registry.list()
    }

    /// Check if an identity is online
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.registry.lookup(user_id).is_some()
    }
}
