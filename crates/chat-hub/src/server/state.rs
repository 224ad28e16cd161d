//! Hub state
//!
//! Application state shared by every connection and HTTP handler.

use crate::broadcast::{trigger_channel, EventDispatcher, HubTriggers};
use crate::connection::SessionRegistry;
use crate::presence::PresenceTracker;
use crate::typing::TypingRelay;
use chat_common::HubConfig;
use chat_core::{IdentityVerifier, ParticipantView};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hub application state
///
/// Holds all shared dependencies for the hub server. The registry is owned
/// here and injected into the components that need it.
#[derive(Clone)]
pub struct HubState {
    /// Authenticated sessions
    registry: Arc<SessionRegistry>,
    /// Single writer of registry membership
    presence: Arc<PresenceTracker>,
    /// Typing fan-out
    typing: Arc<TypingRelay>,
    /// Trigger fan-out
    dispatcher: Arc<EventDispatcher>,
    /// Entry points for the API layer
    triggers: HubTriggers,
    /// Credential verification
    verifier: Arc<dyn IdentityVerifier>,
    /// Open WebSocket connections, authenticated or not
    open_connections: Arc<AtomicUsize>,
    /// Hub settings
    config: Arc<HubConfig>,
}

impl HubState {
    /// Create the hub state and start the event dispatcher
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        participants: Arc<dyn ParticipantView>,
        config: HubConfig,
    ) -> Self {
        let registry = SessionRegistry::new_shared();
        let presence = Arc::new(PresenceTracker::new(registry.clone()));
        let typing = Arc::new(TypingRelay::new(registry.clone(), participants.clone()));
        let dispatcher = Arc::new(EventDispatcher::new(registry.clone(), participants));

        let (triggers, receiver) = trigger_channel(config.trigger_buffer);
        dispatcher.clone().start(receiver);

        Self {
            registry,
            presence,
            typing,
            dispatcher,
            triggers,
            verifier,
            open_connections: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        }
    }

    /// Get the session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Get the presence tracker
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Get the typing relay
    pub fn typing(&self) -> &TypingRelay {
        &self.typing
    }

    /// Get the event dispatcher
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Get the trigger interface for the API layer
    pub fn triggers(&self) -> &HubTriggers {
        &self.triggers
    }

    /// Get the identity verifier
    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.verifier.as_ref()
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Number of open WebSocket connections
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn connection_closed(&self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubState")
            .field("registry", &self.registry)
            .field("open_connections", &self.open_connections())
            .field("outbound_buffer", &self.config.outbound_buffer)
            .field("trigger_buffer", &self.config.trigger_buffer)
            .finish_non_exhaustive()
    }
}
