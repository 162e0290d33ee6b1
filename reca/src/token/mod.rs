//! Access-token codec: stateless signing and verification of short-lived tokens.

pub mod codec;
pub mod errors;

pub use codec::{AccessClaims, ClaimSet, TokenCodec};
pub use errors::{TokenError, TokenResult};
