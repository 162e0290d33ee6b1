//! Authentication engine.
//!
//! [`AuthEngine`] composes the credential store, password hasher, token
//! codec, session ledger and OAuth providers into the public operations:
//! - password and OAuth login, password signup
//! - refresh-token rotation with reuse detection
//! - logout of one session or all of a user's sessions
//! - access-token verification
//! - identity unlink and account deletion
//!
//! ## Example
//!
//! ```no_run
//! use reca::auth::{AuthEngine, EngineSettings, LoginRequest};
//! use reca::credentials::{MemoryCredentialStore, PasswordHasher};
//! use reca::oauth::OAuthProviders;
//! use reca::session::{DeviceInfo, MemorySessionStore, SessionLedger};
//! use reca::token::TokenCodec;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = EngineSettings::default();
//!     let engine = AuthEngine::new(
//!         Arc::new(MemoryCredentialStore::new()),
//!         PasswordHasher::new("server-side-pepper"),
//!         Arc::new(TokenCodec::new(b"a-secret-of-at-least-32-bytes!!!", "reca")),
//!         SessionLedger::new(Arc::new(MemorySessionStore::new()), settings.refresh_ttl),
//!         OAuthProviders::new(),
//!         settings,
//!     );
//!
//!     let request = LoginRequest {
//!         email: "a@x.com".to_string(),
//!         password: "correct horse".to_string(),
//!     };
//!     let tokens = engine.login_with_password(request, DeviceInfo::default()).await?;
//!     println!("Signed in as {}", tokens.user_id);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod errors;
pub mod models;

pub use engine::{AuthEngine, EngineSettings};
pub use errors::{AuthError, AuthResult, ErrorKind};
pub use models::{
    LoginRequest, LoginStage, LogoutTarget, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN, OAuthCallbackRequest,
    SessionTokens, SignupRequest,
};
