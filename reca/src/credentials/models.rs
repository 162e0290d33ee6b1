//! User and identity data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User ID type
pub type UserId = Uuid;

/// Identity provider a user can sign in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthProvider {
    Password,
    Google,
    Microsoft,
}

impl AuthProvider {
    /// Canonical upper-case name, as stored in the `provider` column
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Password => "PASSWORD",
            AuthProvider::Google => "GOOGLE",
            AuthProvider::Microsoft => "MICROSOFT",
        }
    }

    /// Whether sign-in goes through an external OAuth exchange
    pub fn is_oauth(&self) -> bool {
        !matches!(self, AuthProvider::Password)
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised provider name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown auth provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for AuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASSWORD" => Ok(AuthProvider::Password),
            "GOOGLE" => Ok(AuthProvider::Google),
            "MICROSOFT" => Ok(AuthProvider::Microsoft),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Active and not soft-deleted
    pub fn can_sign_in(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Link between a user and an auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub user_id: UserId,
    pub provider: AuthProvider,
    pub provider_user_id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub provider_tokens: Option<crate::oauth::ProviderTokens>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    /// Argon2 PHC string; when present a `PASSWORD` identity is created too
    pub password_hash: Option<String>,
    pub email_verified: bool,
}

/// Input for linking an external provider to a user
#[derive(Debug, Clone)]
pub struct IdentityLink {
    pub provider: AuthProvider,
    pub provider_user_id: String,
    pub email: String,
    pub email_verified: bool,
}

/// Lower-case and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal structural check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!("google".parse::<AuthProvider>().unwrap(), AuthProvider::Google);
        assert_eq!(" Microsoft ".parse::<AuthProvider>().unwrap(), AuthProvider::Microsoft);
        assert_eq!("PASSWORD".parse::<AuthProvider>().unwrap(), AuthProvider::Password);
        assert!("github".parse::<AuthProvider>().is_err());
    }

    #[test]
    fn test_provider_serde_uses_upper_case() {
        let json = serde_json::to_string(&AuthProvider::Google).unwrap();
        assert_eq!(json, "\"GOOGLE\"");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("  first.last@sub.example.org "));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    proptest! {
        #[test]
        fn normalize_email_is_idempotent(email in "[A-Za-z0-9._%+-]{1,20}@[A-Za-z0-9-]{1,12}\\.[A-Za-z]{2,6}") {
            let once = normalize_email(&email);
            prop_assert_eq!(normalize_email(&once), once.clone());
            prop_assert!(is_valid_email(&once));
            prop_assert_eq!(once.to_lowercase(), once);
        }

        #[test]
        fn normalized_emails_compare_case_insensitively(email in "[a-z0-9]{1,10}@[a-z]{1,10}\\.com") {
            prop_assert_eq!(normalize_email(&email.to_uppercase()), normalize_email(&email));
        }
    }
}
