//! OAuth provider error types.

use thiserror::Error;

use crate::credentials::AuthProvider;

/// Failures talking to an external OAuth provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS or protocol failure
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// No response within the configured timeout
    #[error("Provider request timed out")]
    Timeout,

    /// Provider answered with a non-success status
    #[error("Provider rejected request with status {status}")]
    Rejected { status: u16, body: String },

    /// Response body was not what the contract promises
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Callback redirect URI differs from the registered one
    #[error("Redirect URI does not match the registered callback")]
    RedirectMismatch,

    /// No client registration for this provider
    #[error("Provider {0} is not configured")]
    NotConfigured(AuthProvider),
}

impl ProviderError {
    /// Whether a second attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout => true,
            ProviderError::Rejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(ProviderError::Rejected { status: 503, body: String::new() }.is_transient());
        assert!(ProviderError::Rejected { status: 429, body: String::new() }.is_transient());
        assert!(!ProviderError::Rejected { status: 400, body: String::new() }.is_transient());
        assert!(!ProviderError::InvalidResponse("x".into()).is_transient());
        assert!(!ProviderError::NotConfigured(AuthProvider::Google).is_transient());
    }
}
