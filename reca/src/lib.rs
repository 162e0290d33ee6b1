//! # RECA
//!
//! Session and credential-issuance engine for the ACA RECA authentication
//! backend.
//!
//! A principal authenticates by password or OAuth; the engine issues a
//! short-lived signed access token plus an opaque single-use refresh token,
//! rotates refresh tokens atomically, and revokes every session of a user
//! when a consumed refresh token is presented again.
//!
//! ## Core Modules
//!
//! - [`auth`]: the engine composing everything below
//! - [`credentials`]: users, identities and password hashing
//! - [`session`]: refresh-token ledger with one-time-use rotation
//! - [`token`]: access-token signing and verification
//! - [`oauth`]: OAuth code exchange and userinfo client
//! - [`db`]: PostgreSQL pool, migrations and query timeouts

pub mod auth;
pub mod credentials;
pub mod db;
pub mod oauth;
pub mod session;
pub mod token;

pub use auth::{AuthEngine, AuthError, AuthResult, EngineSettings, ErrorKind};
pub use credentials::{AuthProvider, UserId};
pub use db::{Database, DatabaseConfig};
