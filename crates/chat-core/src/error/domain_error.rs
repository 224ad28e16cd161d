//! Domain errors - failures reported by the collaborators the hub consumes

use thiserror::Error;

use crate::value_objects::UserId;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Authentication Errors
    // =========================================================================
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Credential expired")]
    CredentialExpired,

    #[error("Credential does not belong to user {claimed}")]
    IdentityMismatch { claimed: UserId },

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("Participant lookup unavailable: {0}")]
    LookupUnavailable(String),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::IdentityMismatch { claimed: UserId::new(12) };
        assert_eq!(err.to_string(), "Credential does not belong to user 12");

        let err = DomainError::LookupUnavailable("timed out".to_string());
        assert_eq!(err.to_string(), "Participant lookup unavailable: timed out");
    }
}
