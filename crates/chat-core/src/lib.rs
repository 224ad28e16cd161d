//! # chat-core
//!
//! Domain layer for the chat hub: typed identifiers, the committed message
//! record, domain errors and the collaborator ports the hub consumes.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::ChatMessage;
pub use error::DomainError;
pub use traits::{IdentityVerifier, LookupResult, ParticipantView};
pub use value_objects::{ConversationId, IdParseError, MessageId, UserId};
