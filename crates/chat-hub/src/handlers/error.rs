//! Handler error types

use crate::protocol::CloseCode;
use chat_core::DomainError;
use thiserror::Error;

/// Message sent to the client when its credential is rejected
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "Authentication failed.";

/// Message sent to the client when an intent could not be carried out
pub const PROCESSING_FAILED_MESSAGE: &str = "Error processing message.";

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Frame could not be decoded into an intent
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Intent other than `authenticate` before authentication
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Second `authenticate` on an authenticated connection
    #[error("Already authenticated")]
    AlreadyAuthenticated,

    /// Identity verifier rejected the credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[source] DomainError),

    /// A collaborator failed while handling an authenticated intent
    #[error("Lookup failed: {0}")]
    Lookup(#[from] DomainError),
}

impl HandlerError {
    /// Convert to a close code
    ///
    /// `None` means the connection stays open.
    pub fn to_close_code(&self) -> Option<CloseCode> {
        match self {
            Self::InvalidPayload(_) => Some(CloseCode::DecodeError),
            Self::NotAuthenticated => Some(CloseCode::NotAuthenticated),
            Self::AlreadyAuthenticated => Some(CloseCode::AlreadyAuthenticated),
            Self::AuthenticationFailed(_) => Some(CloseCode::AuthenticationFailed),
            Self::Lookup(_) => None,
        }
    }

    /// Text of the `error` event to send before closing or continuing, if any
    pub fn client_message(&self) -> Option<&'static str> {
        match self {
            Self::AuthenticationFailed(_) => Some(AUTHENTICATION_FAILED_MESSAGE),
            Self::Lookup(_) => Some(PROCESSING_FAILED_MESSAGE),
            Self::InvalidPayload(_) | Self::NotAuthenticated | Self::AlreadyAuthenticated => None,
        }
    }

    /// Check if this is a protocol violation (closed without an error event)
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_) | Self::NotAuthenticated | Self::AlreadyAuthenticated
        )
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
