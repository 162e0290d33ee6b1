//! Credential store: users, password hashes and OAuth identity links.
//!
//! The [`CredentialStore`] trait is the data-access contract; [`PgCredentialStore`]
//! persists to PostgreSQL and [`MemoryCredentialStore`] keeps everything in
//! process. [`PasswordHasher`] owns the slow, salted, peppered hash.

pub mod errors;
pub mod memory;
pub mod models;
pub mod password;
pub mod store;

pub use errors::{CredentialError, CredentialResult};
pub use memory::MemoryCredentialStore;
pub use models::{
    AuthIdentity, AuthProvider, IdentityLink, NewUser, UnknownProvider, User, UserId,
    is_valid_email, normalize_email,
};
pub use password::PasswordHasher;
pub use store::{CredentialStore, PgCredentialStore};
