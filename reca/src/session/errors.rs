//! Session ledger error types.

use thiserror::Error;

use crate::credentials::UserId;
use crate::db::timeouts::TimeoutError;

/// Session ledger errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session matches the presented refresh token
    #[error("Invalid refresh token")]
    Invalid,

    /// Session found but past its expiry
    #[error("Session expired")]
    Expired,

    /// Token belongs to a session that was already rotated or revoked
    #[error("Refresh token reused")]
    Reused { user_id: UserId },

    /// Backing store could not be reached or timed out
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<TimeoutError> for SessionError {
    fn from(err: TimeoutError) -> Self {
        SessionError::StoreUnavailable(err.to_string())
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::StoreUnavailable(err.to_string())
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
