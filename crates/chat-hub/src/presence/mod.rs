//! Presence tracking

mod tracker;

pub use tracker::{JoinOutcome, PresenceTracker};
