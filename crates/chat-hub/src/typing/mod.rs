//! Typing indicators

mod relay;

pub use relay::TypingRelay;
