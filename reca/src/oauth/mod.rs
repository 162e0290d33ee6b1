//! OAuth provider collaborator.
//!
//! Only the token endpoint (code → token) and the userinfo endpoint
//! (token → profile) are consumed; authorization redirects happen elsewhere.

pub mod errors;
pub mod models;
pub mod provider;
pub mod retry;

pub use errors::{ProviderError, ProviderResult};
pub use models::{OAuthProviderConfig, ProviderProfile, ProviderTokens};
pub use provider::{HttpOAuthProvider, OAuthProvider, OAuthProviders};
pub use retry::{DEFAULT_RETRY_BACKOFF, with_retry};
