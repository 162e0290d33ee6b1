//! OAuth exchange data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credentials::AuthProvider;

/// Tokens issued by an OAuth provider, persisted on the linked identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The subset of the provider's userinfo response the engine relies on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Stable provider-side subject identifier
    pub sub: String,
    pub email: String,
    /// Whether the provider vouches for the email address
    pub email_verified: bool,
}

/// Client registration and endpoints for one provider
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub provider: AuthProvider,
    pub client_id: String,
    pub client_secret: String,
    /// Registered redirect URL; callbacks naming another URI are refused
    pub redirect_url: Option<String>,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthProviderConfig {
    /// Google OpenID Connect endpoints
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            provider: AuthProvider::Google,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: None,
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        }
    }

    /// Microsoft identity platform (v2.0) endpoints for `tenant`
    pub fn microsoft(
        tenant: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            provider: AuthProvider::Microsoft,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: None,
            token_url: format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
            userinfo_url: "https://graph.microsoft.com/oidc/userinfo".to_string(),
        }
    }

    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    /// Point both endpoints at another base URL (used against local mocks)
    pub fn with_endpoints(mut self, token_url: impl Into<String>, userinfo_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.userinfo_url = userinfo_url.into();
        self
    }
}
