//! OAuth provider collaborator: code exchange and userinfo fetch.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::errors::{ProviderError, ProviderResult};
use super::models::{OAuthProviderConfig, ProviderProfile, ProviderTokens};
use crate::credentials::AuthProvider;

/// Token and userinfo contract of an external OAuth provider.
///
/// Implementations are untrusted network calls; callers wrap them in
/// [`with_retry`](super::with_retry).
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Which provider this client talks to
    fn provider(&self) -> AuthProvider;

    /// Exchange an authorization code for provider tokens
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ProviderResult<ProviderTokens>;

    /// Fetch the authenticated user's profile
    async fn fetch_user_info(&self, tokens: &ProviderTokens) -> ProviderResult<ProviderProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

/// reqwest-backed provider client
pub struct HttpOAuthProvider {
    http: reqwest::Client,
    config: OAuthProviderConfig,
}

impl HttpOAuthProvider {
    /// Build a client whose every request is bounded by `timeout`
    pub fn new(config: OAuthProviderConfig, timeout: Duration) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    async fn reject(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Rejected { status, body }
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    fn provider(&self) -> AuthProvider {
        self.config.provider
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ProviderResult<ProviderTokens> {
        if let Some(registered) = &self.config.redirect_url {
            if registered != redirect_uri {
                return Err(ProviderError::RedirectMismatch);
            }
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let raw: TokenResponse = response.json().await?;
        if raw.access_token.is_empty() {
            return Err(ProviderError::InvalidResponse("empty access_token".to_string()));
        }

        Ok(ProviderTokens {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            expires_at: raw
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn fetch_user_info(&self, tokens: &ProviderTokens) -> ProviderResult<ProviderProfile> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let raw: UserInfoResponse = response.json().await?;
        if raw.sub.is_empty() {
            return Err(ProviderError::InvalidResponse("empty sub".to_string()));
        }
        let email = raw
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("missing email".to_string()))?;

        Ok(ProviderProfile {
            sub: raw.sub,
            email,
            email_verified: raw.email_verified.unwrap_or(false),
        })
    }
}

/// Configured provider clients, keyed by provider
#[derive(Clone, Default)]
pub struct OAuthProviders {
    providers: HashMap<AuthProvider, Arc<dyn OAuthProvider>>,
}

impl OAuthProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Register (or replace) the client for its provider
    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.provider(), provider);
    }

    /// Look up the client for `provider`
    pub fn get(&self, provider: AuthProvider) -> ProviderResult<Arc<dyn OAuthProvider>> {
        self.providers
            .get(&provider)
            .cloned()
            .ok_or(ProviderError::NotConfigured(provider))
    }

    /// Providers with a client registered
    pub fn configured(&self) -> Vec<AuthProvider> {
        let mut providers: Vec<AuthProvider> = self.providers.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let google = HttpOAuthProvider::new(
            OAuthProviderConfig::google("id", "secret"),
            Duration::from_secs(1),
        )
        .unwrap();
        let providers = OAuthProviders::new().with(Arc::new(google));

        assert!(providers.get(AuthProvider::Google).is_ok());
        assert!(matches!(
            providers.get(AuthProvider::Microsoft),
            Err(ProviderError::NotConfigured(AuthProvider::Microsoft))
        ));
        assert_eq!(providers.configured(), vec![AuthProvider::Google]);
    }

    #[tokio::test]
    async fn test_redirect_mismatch_refused_before_network() {
        let config = OAuthProviderConfig::google("id", "secret")
            .with_redirect_url("https://app.example.com/callback")
            .with_endpoints("http://127.0.0.1:9/token", "http://127.0.0.1:9/userinfo");
        let provider = HttpOAuthProvider::new(config, Duration::from_secs(1)).unwrap();

        let err = provider
            .exchange_code("abc", "https://evil.example.com/callback")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RedirectMismatch));
    }
}
