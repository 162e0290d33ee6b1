//! HTTP API for the authentication server.
//!
//! # Modules
//!
//! - [`auth`]: signup, login, OAuth callback, refresh, logout, identity management
//! - [`error`]: mapping of engine errors to status codes and JSON bodies
//! - [`extract`]: JSON body extractor with `400` rejections
//! - [`middleware`]: bearer-token authentication for protected endpoints
//! - [`request_id`]: request correlation and per-route request metrics
//!
//! # Endpoints
//!
//! ```text
//! GET    /health                              - Health check (public)
//! POST   /signup                              - Register with email and password
//! POST   /login                               - Password login
//! POST   /login/oauth/{provider}/callback     - OAuth code exchange
//! POST   /token/refresh                       - Rotate refresh token
//! POST   /logout                              - Revoke one or all sessions
//! DELETE /identities/{provider}               - Unlink sign-in method (auth required)
//! DELETE /account                             - Delete account (auth required)
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, restrict origins at the
//! edge proxy.

pub mod auth;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
};
use reca::{AuthEngine, Database};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; everything behind it is reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthEngine>,
    /// Pool used for health reporting; `None` when running on in-memory stores
    pub db: Option<Database>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/login/oauth/{provider}/callback", post(auth::oauth_callback))
        .route("/token/refresh", post(auth::refresh))
        // bearer checked in the handler when `all` is requested
        .route("/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/identities/{provider}", delete(auth::unlink_identity))
        .route("/account", delete(auth::delete_account))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database answers (or no database is attached),
/// `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"oauth_providers":["GOOGLE"],"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.db {
        Some(db) => Some(db.health_check().await.is_ok()),
        None => None,
    };
    let healthy = db_healthy.unwrap_or(true);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let providers: Vec<&str> = state
        .engine
        .providers()
        .configured()
        .iter()
        .map(|p| p.as_str())
        .collect();

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "oauth_providers": providers,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
