//! Domain entities

mod message;

pub use message::ChatMessage;
