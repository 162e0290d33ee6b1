//! Credential store error types.

use thiserror::Error;

use crate::db::timeouts::TimeoutError;

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No live user or identity matched the lookup
    #[error("Not found")]
    NotFound,

    /// Unique constraint hit (email, provider link, password identity)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backing store could not be reached or timed out
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// Password hashing or verification task failed
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl From<TimeoutError> for CredentialError {
    fn from(err: TimeoutError) -> Self {
        if err.is_unique_violation() {
            CredentialError::Conflict("duplicate credential".to_string())
        } else {
            CredentialError::StoreUnavailable(err.to_string())
        }
    }
}

impl From<sqlx::Error> for CredentialError {
    fn from(err: sqlx::Error) -> Self {
        TimeoutError::Database(err).into()
    }
}

/// Result type for credential store operations
pub type CredentialResult<T> = Result<T, CredentialError>;
