//! In-memory collaborators for tests
//!
//! Available to this crate's unit tests and, with the `testing` feature, to
//! the integration test crate.

use async_trait::async_trait;
use chat_core::{ConversationId, DomainError, IdentityVerifier, LookupResult, ParticipantView, UserId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Identity verifier backed by a token table
#[derive(Debug, Default)]
pub struct StaticVerifier {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl StaticVerifier {
    /// Create an empty verifier (rejects everything)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a user and return it
    pub fn issue(&self, user_id: i64) -> String {
        let user_id = UserId::new(user_id);
        let token = format!("token-{user_id}");
        self.tokens.write().insert(token.clone(), user_id);
        token
    }

    /// Revoke a previously issued token
    pub fn revoke(&self, token: &str) {
        self.tokens.write().remove(token);
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, claimed: UserId, credential: &str) -> LookupResult<UserId> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential);
        let owner = self
            .tokens
            .read()
            .get(token)
            .copied()
            .ok_or(DomainError::InvalidCredential)?;

        if owner == claimed {
            Ok(owner)
        } else {
            Err(DomainError::IdentityMismatch { claimed })
        }
    }
}

/// Participant view backed by a map
#[derive(Debug, Default)]
pub struct InMemoryParticipants {
    conversations: RwLock<HashMap<ConversationId, BTreeSet<UserId>>>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryParticipants {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the members of a conversation
    pub fn set_members(&self, conversation: i64, members: impl IntoIterator<Item = i64>) {
        self.conversations.write().insert(
            ConversationId::new(conversation),
            members.into_iter().map(UserId::new).collect(),
        );
    }

    /// Remove one member from a conversation
    pub fn remove_member(&self, conversation: i64, user_id: i64) {
        if let Some(members) = self
            .conversations
            .write()
            .get_mut(&ConversationId::new(conversation))
        {
            members.remove(&UserId::new(user_id));
        }
    }

    /// Make every lookup fail with `LookupUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups served or failed so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParticipantView for InMemoryParticipants {
    async fn get(
        &self,
        conversation: ConversationId,
        exclude: Option<UserId>,
    ) -> LookupResult<Vec<UserId>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::LookupUnavailable(
                "participant store offline".to_string(),
            ));
        }

        Ok(self
            .conversations
            .read()
            .get(&conversation)
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|member| Some(*member) != exclude)
                    .collect()
            })
            .unwrap_or_default())
    }
}
