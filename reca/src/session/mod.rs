//! Session ledger: persistent refresh-token grants with one-time-use rotation.
//!
//! [`SessionLedger`] is the only component that mutates sessions. It stores
//! hashes of refresh tokens, never the tokens themselves, and delegates the
//! atomic consume-and-replace step to a [`SessionStore`].

pub mod errors;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod store;

pub use errors::{SessionError, SessionResult};
pub use ledger::{SessionLedger, generate_refresh_token, hash_refresh_token};
pub use memory::MemorySessionStore;
pub use models::{DeviceInfo, NewSession, RevokeTarget, Rotation, Session};
pub use store::{PgSessionStore, SessionStore};
