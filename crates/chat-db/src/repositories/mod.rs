//! Repository implementations
//!
//! PostgreSQL implementations of the read-only ports defined in chat-core.

mod error;
mod participant;

pub use participant::PgParticipantView;
