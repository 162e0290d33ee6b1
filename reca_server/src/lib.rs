//! HTTP server for the ACA RECA authentication backend.
//!
//! The binary in `main.rs` wires configuration, logging, the database pool
//! and the [`reca::AuthEngine`] into the axum router defined in [`api`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
