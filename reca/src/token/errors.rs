//! Token codec error types.

use thiserror::Error;

/// Access-token failures.
///
/// `Expired` and `Invalid` stay distinct: an expired token warrants a refresh,
/// an invalid one a fresh login.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, issuer or structure check failed
    #[error("Invalid access token")]
    Invalid,

    /// Signature valid but `exp` has passed
    #[error("Access token expired")]
    Expired,

    /// Token could not be signed
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;
