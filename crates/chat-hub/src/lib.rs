//! # chat-hub
//!
//! Real-time coordination hub: a single WebSocket endpoint that tracks who is
//! online, relays typing indicators and fans committed writes out to the
//! affected users.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod presence;
pub mod protocol;
pub mod server;
pub mod typing;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use server::{create_app, run, HubState};
