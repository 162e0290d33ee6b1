//! Authentication API handlers.
//!
//! JSON endpoints for signup, password and OAuth login, token refresh,
//! logout, identity unlink and account deletion. Successful sign-ins return
//! a [`SessionTokens`] body; failures go through [`ApiError`].
//!
//! # Examples
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:8080/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "a@x.com", "password": "correct horse"}'
//! ```
//!
//! Refresh:
//! ```bash
//! curl -X POST http://localhost:8080/token/refresh \
//!   -H "Content-Type: application/json" \
//!   -d '{"refresh_token": "9f86d0..."}'
//! ```

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
};
use reca::auth::{
    AuthError, LoginRequest, LogoutTarget, OAuthCallbackRequest, SessionTokens, SignupRequest,
};
use reca::credentials::AuthProvider;
use reca::session::DeviceInfo;
use reca::token::AccessClaims;
use serde::Deserialize;

use super::{
    AppState, error::ApiError, extract::ApiJson, middleware::bearer_token, request_id::RequestId,
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackPayload {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutPayload {
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Revoke every session of the bearer's user
    #[serde(default)]
    pub all: bool,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client metadata from `User-Agent` and the first `X-Forwarded-For` hop
pub fn device_info(headers: &HeaderMap) -> DeviceInfo {
    DeviceInfo {
        user_agent: header_value(headers, USER_AGENT.as_str()).map(|ua| ua.chars().take(512).collect()),
        ip_address: header_value(headers, "x-forwarded-for")
            .and_then(|xff| xff.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty()),
    }
}

fn outcome(result: &Result<SessionTokens, AuthError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(AuthError::InvalidCredentials) => "invalid_credentials",
        Err(AuthError::AccountInactive) => "inactive",
        Err(AuthError::Validation(_)) => "invalid_request",
        Err(AuthError::Conflict(_)) => "conflict",
        Err(AuthError::Reused) => "reused",
        Err(AuthError::Expired) => "expired",
        Err(AuthError::Invalid) => "invalid",
        Err(AuthError::Provider(_)) => "provider_error",
        Err(AuthError::StoreUnavailable) | Err(AuthError::Internal(_)) => "error",
    }
}

/// Register a password account and sign it in.
///
/// # Response
///
/// `201 Created` with the token pair.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid email or password shorter than 8 characters
/// - `409 Conflict`: Email already registered
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<SessionTokens>), ApiError> {
    let result = state
        .engine
        .register_with_password(payload, device_info(&headers))
        .await;
    metrics::login_attempts_total("signup", outcome(&result));

    Ok((StatusCode::CREATED, Json(result?)))
}

/// Log in with email and password.
///
/// # Errors
///
/// - `400 Bad Request`: Missing email or password
/// - `401 Unauthorized`: Invalid credentials or inactive account
pub async fn login(
    State(state): State<AppState>,
    request_id: RequestId,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<SessionTokens>, ApiError> {
    let device = device_info(&headers);
    let ip = device.ip_address.clone();
    let result = state.engine.login_with_password(payload, device).await;
    metrics::login_attempts_total("password", outcome(&result));

    if let Err(AuthError::InvalidCredentials | AuthError::AccountInactive) = &result {
        log_security_event(
            "failed_login",
            None,
            ip.as_deref(),
            &format!("Password login rejected (request {})", request_id.as_str()),
        );
    }

    Ok(Json(result?))
}

/// Complete an OAuth login with the authorization code.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown or unconfigured provider, empty code or redirect URI
/// - `409 Conflict`: Email belongs to another account and is not provider-verified
/// - `502 Bad Gateway`: Provider unreachable or rejected the code
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<OAuthCallbackPayload>,
) -> Result<Json<SessionTokens>, ApiError> {
    let provider: AuthProvider = provider
        .parse()
        .map_err(|e: reca::credentials::UnknownProvider| AuthError::Validation(e.to_string()))?;

    let request = OAuthCallbackRequest {
        provider: Some(provider),
        code: payload.code,
        redirect_uri: payload.redirect_uri,
    };
    let result = state
        .engine
        .login_with_oauth(request, device_info(&headers))
        .await;
    metrics::login_attempts_total("oauth", outcome(&result));

    Ok(Json(result?))
}

/// Exchange a refresh token for a new token pair.
///
/// Reusing a consumed token revokes every session of its owner and answers
/// with the same `401` as an unknown token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<RefreshPayload>,
) -> Result<Json<SessionTokens>, ApiError> {
    let device = device_info(&headers);
    let result = state.engine.refresh(&payload.refresh_token, &device).await;
    metrics::token_refresh_total(outcome(&result));

    if let Err(AuthError::Reused) = &result {
        metrics::refresh_reuse_detected_total();
        log_security_event(
            "refresh_token_reuse",
            None,
            device.ip_address.as_deref(),
            "Consumed refresh token presented; sessions revoked",
        );
    }

    Ok(Json(result?))
}

/// Revoke the session behind a refresh token, or with `{"all": true}` and a
/// bearer token every session of the caller.
///
/// Always `204 No Content` for a well-formed request, even when nothing was
/// active.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LogoutPayload>,
) -> Result<StatusCode, ApiError> {
    let target = if payload.all {
        let token = bearer_token(&headers).ok_or(ApiError(AuthError::Invalid))?;
        let claims = state.engine.authenticate(token).await?;
        LogoutTarget::User(claims.sub)
    } else {
        let raw = payload
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError::Validation("refresh_token is required".to_string()))?;
        LogoutTarget::RefreshToken(raw)
    };

    let all = matches!(target, LogoutTarget::User(_));
    let revoked = state.engine.logout(target).await?;
    if all {
        tracing::info!(revoked, "Signed out of all sessions");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a linked sign-in method from the bearer's account.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown provider, not linked, or the last sign-in method
pub async fn unlink_identity(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    Path(provider): Path<String>,
) -> Result<StatusCode, ApiError> {
    let provider: AuthProvider = provider
        .parse()
        .map_err(|e: reca::credentials::UnknownProvider| AuthError::Validation(e.to_string()))?;

    state.engine.unlink_identity(claims.sub, provider).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-delete the bearer's account and revoke all of its sessions.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_account(claims.sub).await?;
    log_security_event("account_deleted", Some(claims.sub), None, "Account soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_device_info_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

        let device = device_info(&headers);
        assert_eq!(device.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(device.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_device_info_absent_headers() {
        assert_eq!(device_info(&HeaderMap::new()), DeviceInfo::default());
    }
}
