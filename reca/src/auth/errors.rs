//! Authentication error types.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::oauth::ProviderError;
use crate::session::SessionError;
use crate::token::TokenError;

/// Error taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request; never retried, the caller must correct it
    ValidationError,
    /// Terminal for this attempt; may prompt a re-login
    AuthError,
    /// Duplicate identity link
    ConflictError,
    /// Store or provider failure; transient
    DependencyError,
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// User exists but is deactivated or deleted
    #[error("Account is inactive")]
    AccountInactive,

    /// Token or session past its expiry
    #[error("Token expired")]
    Expired,

    /// Refresh token presented after it was consumed or revoked
    #[error("Refresh token reused")]
    Reused,

    /// Token unknown, forged or malformed
    #[error("Invalid token")]
    Invalid,

    /// Identity or email already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credential or session store unreachable
    #[error("Store unavailable")]
    StoreUnavailable,

    /// OAuth provider failure after retry
    #[error("OAuth provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Hashing or signing failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) => ErrorKind::ValidationError,
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::Expired
            | AuthError::Reused
            | AuthError::Invalid => ErrorKind::AuthError,
            AuthError::Conflict(_) => ErrorKind::ConflictError,
            AuthError::StoreUnavailable | AuthError::Provider(_) | AuthError::Internal(_) => {
                ErrorKind::DependencyError
            }
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Refresh-token failures collapse into one message so a caller cannot
    /// tell a stolen token from an expired one.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Validation(msg) => msg.clone(),
            AuthError::InvalidCredentials => "Invalid credentials".to_string(),
            AuthError::AccountInactive => "Account is inactive".to_string(),
            AuthError::Expired | AuthError::Reused | AuthError::Invalid => {
                "Invalid or expired token".to_string()
            }
            AuthError::Conflict(_) => "Account already exists or identity is linked elsewhere".to_string(),
            AuthError::StoreUnavailable => "Service temporarily unavailable".to_string(),
            AuthError::Provider(_) => "Identity provider unavailable".to_string(),
            AuthError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound => AuthError::InvalidCredentials,
            CredentialError::Conflict(msg) => AuthError::Conflict(msg),
            CredentialError::StoreUnavailable(_) => AuthError::StoreUnavailable,
            CredentialError::Hashing(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Invalid => AuthError::Invalid,
            SessionError::Expired => AuthError::Expired,
            SessionError::Reused { .. } => AuthError::Reused,
            SessionError::StoreUnavailable(_) => AuthError::StoreUnavailable,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::Invalid,
            TokenError::Expired => AuthError::Expired,
            TokenError::Encoding(msg) => AuthError::Internal(msg),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
