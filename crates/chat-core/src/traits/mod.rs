//! Ports - interfaces to collaborators that live outside the hub

mod collaborators;

pub use collaborators::{IdentityVerifier, LookupResult, ParticipantView};
