//! Error handling utilities for repositories

use chat_core::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to `DomainError`
///
/// Pool exhaustion and connection loss mean the lookup itself is unavailable;
/// anything else is reported as a database error.
pub fn map_db_error(e: SqlxError) -> DomainError {
    match e {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
            DomainError::LookupUnavailable(e.to_string())
        }
        other => DomainError::DatabaseError(other.to_string()),
    }
}
