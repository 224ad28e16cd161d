//! Collaborator ports
//!
//! The hub owns no durable state. Identity verification and conversation
//! membership both belong to the storage/auth layer; the hub only awaits
//! these read-only calls. Implementations live in infrastructure crates
//! (`chat-common` for JWT verification, `chat-db` for PostgreSQL).

use async_trait::async_trait;

use crate::error::DomainError;
use crate::value_objects::{ConversationId, UserId};

/// Result type for collaborator lookups
pub type LookupResult<T> = Result<T, DomainError>;

/// Verifies the credential presented in an `authenticate` intent
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `credential` for `claimed` and return the verified identity
    async fn verify(&self, claimed: UserId, credential: &str) -> LookupResult<UserId>;
}

/// Read-only projection of conversation membership
#[async_trait]
pub trait ParticipantView: Send + Sync {
    /// List the members of `conversation`, optionally leaving out `exclude`.
    ///
    /// Results are never cached by the hub; every dispatch performs a fresh
    /// lookup.
    async fn get(
        &self,
        conversation: ConversationId,
        exclude: Option<UserId>,
    ) -> LookupResult<Vec<UserId>>;
}
