//! Authentication request and response models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{AuthError, AuthResult};
use crate::credentials::{AuthProvider, UserId, is_valid_email};

/// Minimum password length accepted at signup
pub const MIN_PASSWORD_LEN: usize = 8;

/// Upper bound on password length, keeps hashing cost bounded
pub const MAX_PASSWORD_LEN: usize = 1024;

/// Password login request
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> AuthResult<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation("email and password are required".to_string()));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(AuthError::Validation("password is too long".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Password signup request
#[derive(Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> AuthResult<()> {
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation("email address is not valid".to_string()));
        }
        let len = self.password.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(AuthError::Validation("password is too long".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// OAuth callback carrying the authorization code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCallbackRequest {
    pub provider: Option<AuthProvider>,
    pub code: String,
    pub redirect_uri: String,
}

impl OAuthCallbackRequest {
    /// Accept only an external provider with a non-empty code and redirect URI
    pub fn validate(&self) -> AuthResult<AuthProvider> {
        let provider = match self.provider {
            None => return Err(AuthError::Validation("provider is required".to_string())),
            Some(AuthProvider::Password) => {
                return Err(AuthError::Validation("PASSWORD is not an OAuth provider".to_string()));
            }
            Some(provider) => provider,
        };
        if self.code.trim().is_empty() {
            return Err(AuthError::Validation("authorization code is required".to_string()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(AuthError::Validation("redirect_uri is required".to_string()));
        }
        Ok(provider)
    }
}

/// Token pair handed back on login, signup and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    pub user_id: UserId,
}

/// What a logout revokes
#[derive(Debug, Clone)]
pub enum LogoutTarget {
    /// The session behind one refresh token
    RefreshToken(String),
    /// Every session of the user
    User(UserId),
}

/// Progress of a single login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Received,
    Validated,
    IdentityResolved,
    SessionIssued,
    Rejected,
}

impl LoginStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStage::Received => "received",
            LoginStage::Validated => "validated",
            LoginStage::IdentityResolved => "identity_resolved",
            LoginStage::SessionIssued => "session_issued",
            LoginStage::Rejected => "rejected",
        }
    }

    /// Whether `next` is a legal successor of this stage
    pub fn can_advance_to(&self, next: LoginStage) -> bool {
        matches!(
            (self, next),
            (LoginStage::Received, LoginStage::Validated)
                | (LoginStage::Validated, LoginStage::IdentityResolved)
                | (LoginStage::IdentityResolved, LoginStage::SessionIssued)
                | (
                    LoginStage::Received | LoginStage::Validated | LoginStage::IdentityResolved,
                    LoginStage::Rejected
                )
        )
    }
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
