//! HS256 access-token codec.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{TokenError, TokenResult};
use crate::credentials::UserId;

/// Signed access-token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: UserId,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Session the token was issued for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<Uuid>,
}

/// Caller-supplied claims beyond the registered ones
#[derive(Debug, Clone, Default)]
pub struct ClaimSet {
    pub email: Option<String>,
    pub session_id: Option<Uuid>,
}

/// Issues and verifies access tokens.
///
/// Built once at startup from configuration and shared immutably.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec signing with `secret` under `issuer`
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // expiry is checked by hand with zero leeway, after the signature
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer,
            validation,
        }
    }

    /// Sign an access token for `user_id` valid for `ttl`
    pub fn issue_access_token(&self, user_id: UserId, claims: &ClaimSet, ttl: Duration) -> TokenResult<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            iss: self.issuer.clone(),
            sub: user_id,
            iat: now,
            exp: now + ttl.num_seconds(),
            jti: Uuid::new_v4(),
            email: claims.email.clone(),
            sid: claims.session_id,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, issuer and expiry; return the claims
    pub fn verify_access_token(&self, token: &str) -> TokenResult<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, "reca-test")
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let token = codec
            .issue_access_token(
                user_id,
                &ClaimSet {
                    email: Some("a@x.com".to_string()),
                    session_id: Some(session_id),
                },
                Duration::minutes(15),
            )
            .unwrap();

        let claims = codec.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "reca-test");
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.sid, Some(session_id));
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let codec = codec();
        let token = codec
            .issue_access_token(Uuid::new_v4(), &ClaimSet::default(), Duration::zero())
            .unwrap();
        assert!(matches!(codec.verify_access_token(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_key_is_invalid() {
        let token = codec()
            .issue_access_token(Uuid::new_v4(), &ClaimSet::default(), Duration::minutes(5))
            .unwrap();
        let other = TokenCodec::new(b"another-secret-another-secret-xx", "reca-test");
        assert!(matches!(other.verify_access_token(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_issuer_is_invalid() {
        let token = TokenCodec::new(SECRET, "someone-else")
            .issue_access_token(Uuid::new_v4(), &ClaimSet::default(), Duration::minutes(5))
            .unwrap();
        assert!(matches!(codec().verify_access_token(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_forged_expired_token_is_invalid_not_expired() {
        let token = TokenCodec::new(b"forger-forger-forger-forger-forg", "reca-test")
            .issue_access_token(Uuid::new_v4(), &ClaimSet::default(), Duration::zero())
            .unwrap();
        assert!(matches!(codec().verify_access_token(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let codec = codec();
        let token = codec
            .issue_access_token(Uuid::new_v4(), &ClaimSet::default(), Duration::minutes(5))
            .unwrap();
        let other = codec
            .issue_access_token(Uuid::new_v4(), &ClaimSet::default(), Duration::minutes(5))
            .unwrap();
        let forged_payload = other.split('.').nth(1).unwrap().to_string();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_payload;
        let tampered = parts.join(".");

        assert!(matches!(codec.verify_access_token(&tampered), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(codec().verify_access_token("not.a.jwt"), Err(TokenError::Invalid)));
        assert!(matches!(codec().verify_access_token(""), Err(TokenError::Invalid)));
    }
}
