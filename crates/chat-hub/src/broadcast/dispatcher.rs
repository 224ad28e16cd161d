//! Event dispatcher
//!
//! Resolves the recipients of committed writes and pushes events to their
//! connected sessions. Targeted triggers are delivered as they arrive.
//! Fan-outs that need a participant lookup run on their own task, chained per
//! conversation so two messages stored in the same conversation are never
//! reordered while a slow lookup elsewhere holds nothing up.

use super::trigger::{Trigger, TriggerReceiver};
use crate::connection::{DeliveryReport, SessionRegistry};
use crate::protocol::ServerEvent;
use chat_core::{ChatMessage, ConversationId, DomainError, ParticipantView, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Upper bound on a single participant lookup
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatch failures
///
/// Only participant lookups can fail; delivery problems are skipped and counted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("participant lookup failed for conversation {conversation}: {source}")]
    Lookup {
        conversation: ConversationId,
        #[source]
        source: DomainError,
    },
}

/// Tail of a conversation's chain of in-flight fan-outs
struct Lane {
    seq: u64,
    done: oneshot::Receiver<()>,
}

/// Per-conversation ordering for spawned fan-outs
#[derive(Default)]
struct FanoutLanes {
    next_seq: AtomicU64,
    lanes: Mutex<HashMap<ConversationId, Lane>>,
}

impl FanoutLanes {
    /// Join the back of `conversation`'s chain
    ///
    /// Returns the guard for this fan-out and, when another fan-out for the
    /// same conversation is still in flight, the signal that it finished.
    fn enter(self: &Arc<Self>, conversation: ConversationId) -> (LaneGuard, Option<oneshot::Receiver<()>>) {
        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .lanes
            .lock()
            .insert(conversation, Lane { seq, done: rx })
            .map(|lane| lane.done);

        let guard = LaneGuard {
            lanes: Arc::clone(self),
            conversation,
            seq,
            _done: tx,
        };
        (guard, previous)
    }

    fn len(&self) -> usize {
        self.lanes.lock().len()
    }
}

/// Held by a spawned fan-out until it has delivered
///
/// Dropping it wakes the next fan-out in the same conversation.
struct LaneGuard {
    lanes: Arc<FanoutLanes>,
    conversation: ConversationId,
    seq: u64,
    _done: oneshot::Sender<()>,
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        let mut lanes = self.lanes.lanes.lock();
        // Only the tail of the chain owns the map entry.
        if lanes
            .get(&self.conversation)
            .is_some_and(|lane| lane.seq == self.seq)
        {
            lanes.remove(&self.conversation);
        }
    }
}

/// Routes trigger events to connected sessions
pub struct EventDispatcher {
    registry: Arc<SessionRegistry>,
    participants: Arc<dyn ParticipantView>,
    lanes: Arc<FanoutLanes>,
    /// Whether the trigger loop is running
    running: AtomicBool,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    pub fn new(registry: Arc<SessionRegistry>, participants: Arc<dyn ParticipantView>) -> Self {
        Self {
            registry,
            participants,
            lanes: Arc::new(FanoutLanes::default()),
            running: AtomicBool::new(false),
        }
    }

    async fn participants_of(
        &self,
        conversation: ConversationId,
        exclude: Option<UserId>,
    ) -> Result<Vec<UserId>, DispatchError> {
        let lookup = self.participants.get(conversation, exclude);
        match tokio::time::timeout(LOOKUP_TIMEOUT, lookup).await {
            Ok(result) => result.map_err(|source| DispatchError::Lookup {
                conversation,
                source,
            }),
            Err(_) => Err(DispatchError::Lookup {
                conversation,
                source: DomainError::LookupUnavailable("timed out".to_string()),
            }),
        }
    }

    /// Deliver a stored message to every connected participant, sender included
    pub async fn on_new_message(
        &self,
        message: ChatMessage,
        sender: UserId,
    ) -> Result<DeliveryReport, DispatchError> {
        check_sender(&message, sender);
        let recipients = self.participants_of(message.conversation_id, None).await?;
        Ok(self.deliver_message(message, sender, &recipients))
    }

    fn deliver_message(&self, message: ChatMessage, sender: UserId, recipients: &[UserId]) -> DeliveryReport {
        let conversation = message.conversation_id;
        let report = self
            .registry
            .send_to_users(recipients, &ServerEvent::NewMessage { message });

        tracing::trace!(
            conversation_id = %conversation,
            sender = %sender,
            sent = report.sent,
            skipped = report.skipped,
            "New message dispatched"
        );
        report
    }

    /// Tell `blocked` that `blocker` blocked them; the blocker hears nothing
    pub fn on_block(&self, blocker: UserId, blocked: UserId) -> DeliveryReport {
        let report = self.registry.send_to(
            blocked,
            ServerEvent::UserBlocked {
                blocker_id: blocker,
            },
        );
        tracing::trace!(blocker = %blocker, blocked = %blocked, sent = report.sent, "Block dispatched");
        report
    }

    /// Tell `unblocked` that `blocker` lifted the block
    pub fn on_unblock(&self, blocker: UserId, unblocked: UserId) -> DeliveryReport {
        let report = self.registry.send_to(
            unblocked,
            ServerEvent::UserUnblocked {
                blocker_id: blocker,
            },
        );
        tracing::trace!(blocker = %blocker, unblocked = %unblocked, sent = report.sent, "Unblock dispatched");
        report
    }

    /// Tell `added` they joined a group
    pub fn on_group_member_added(
        &self,
        conversation: ConversationId,
        added: UserId,
        group_name: Option<String>,
    ) -> DeliveryReport {
        let report = self.registry.send_to(
            added,
            ServerEvent::AddedToGroup {
                conversation_id: conversation,
                group_name,
            },
        );
        tracing::trace!(conversation_id = %conversation, added = %added, sent = report.sent, "Group add dispatched");
        report
    }

    /// Tell `removed` first, then every remaining member
    ///
    /// The lookup runs after the removal committed, so it returns the
    /// remaining members only.
    pub async fn on_group_member_removed(
        &self,
        conversation: ConversationId,
        removed: UserId,
        group_name: Option<String>,
    ) -> Result<DeliveryReport, DispatchError> {
        let notified = self.notify_removed(conversation, removed, group_name);
        let remaining = self.participants_of(conversation, None).await?;
        Ok(notified.merge(self.announce_departure(conversation, removed, &remaining)))
    }

    fn notify_removed(
        &self,
        conversation: ConversationId,
        removed: UserId,
        group_name: Option<String>,
    ) -> DeliveryReport {
        self.registry.send_to(
            removed,
            ServerEvent::RemovedFromGroup {
                conversation_id: conversation,
                group_name,
            },
        )
    }

    fn announce_departure(
        &self,
        conversation: ConversationId,
        removed: UserId,
        remaining: &[UserId],
    ) -> DeliveryReport {
        let report = self.registry.send_to_users(
            remaining,
            &ServerEvent::ParticipantLeftGroup {
                conversation_id: conversation,
                user_id: removed,
            },
        );
        tracing::trace!(
            conversation_id = %conversation,
            removed = %removed,
            sent = report.sent,
            skipped = report.skipped,
            "Group removal dispatched"
        );
        report
    }

    /// Run a lookup-bearing fan-out on its own task
    ///
    /// The lookup starts immediately; delivery waits for the previous fan-out
    /// in the same conversation.
    fn spawn_fanout<F>(self: &Arc<Self>, conversation: ConversationId, kind: &'static str, deliver: F)
    where
        F: FnOnce(&Self, &[UserId]) -> DeliveryReport + Send + 'static,
    {
        let (guard, previous) = self.lanes.enter(conversation);
        let dispatcher = Arc::clone(self);

        tokio::spawn(async move {
            let _guard = guard;
            let lookup = dispatcher.participants_of(conversation, None).await;
            if let Some(previous) = previous {
                // Either outcome means the earlier fan-out is finished.
                let _ = previous.await;
            }

            match lookup {
                Ok(recipients) => {
                    deliver(&dispatcher, &recipients);
                }
                Err(e) => {
                    // The write is committed; the only casualty is this fan-out.
                    tracing::error!(trigger = kind, error = %e, "Dispatch aborted");
                }
            }
        });
    }

    fn route(self: &Arc<Self>, trigger: Trigger) {
        let kind = trigger.kind();
        match trigger {
            Trigger::NewMessage { message, sender } => {
                check_sender(&message, sender);
                let conversation = message.conversation_id;
                self.spawn_fanout(conversation, kind, move |dispatcher, recipients| {
                    dispatcher.deliver_message(message, sender, recipients)
                });
            }
            Trigger::Block { blocker, blocked } => {
                self.on_block(blocker, blocked);
            }
            Trigger::Unblock { blocker, unblocked } => {
                self.on_unblock(blocker, unblocked);
            }
            Trigger::GroupMemberAdded {
                conversation,
                added,
                group_name,
            } => {
                self.on_group_member_added(conversation, added, group_name);
            }
            Trigger::GroupMemberRemoved {
                conversation,
                removed,
                group_name,
            } => {
                self.notify_removed(conversation, removed, group_name);
                self.spawn_fanout(conversation, kind, move |dispatcher, remaining| {
                    dispatcher.announce_departure(conversation, removed, remaining)
                });
            }
        }
    }

    /// Start consuming triggers
    ///
    /// Spawns a background task that runs until every `HubTriggers` handle is dropped.
    pub fn start(self: Arc<Self>, receiver: TriggerReceiver) -> JoinHandle<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Event dispatcher is already running");
        }

        tracing::info!("Event dispatcher started");
        tokio::spawn(async move {
            self.run(receiver).await;
        })
    }

    async fn run(self: Arc<Self>, mut receiver: TriggerReceiver) {
        while let Some(trigger) = receiver.recv().await {
            self.route(trigger);
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Event dispatcher loop ended");
    }

    /// Check if the dispatcher is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of conversations with a spawned fan-out still in flight
    pub fn pending_fanouts(&self) -> usize {
        self.lanes.len()
    }
}

fn check_sender(message: &ChatMessage, sender: UserId) {
    if message.sender_id != sender {
        tracing::warn!(
            conversation_id = %message.conversation_id,
            sender_id = %message.sender_id,
            sender = %sender,
            "Trigger sender differs from message record"
        );
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("running", &self.is_running())
            .field("pending_fanouts", &self.pending_fanouts())
            .finish_non_exhaustive()
    }
}
