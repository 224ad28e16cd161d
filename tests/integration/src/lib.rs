//! Integration test utilities for the chat hub
//!
//! This crate provides helpers for running end-to-end tests against the
//! hub's WebSocket endpoint and internal trigger routes.

pub mod helpers;

pub use helpers::*;
