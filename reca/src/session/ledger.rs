//! Session ledger: refresh-token issuance, single-use rotation and revocation.

use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::errors::SessionResult;
use super::models::{DeviceInfo, NewSession, RevokeTarget, Rotation, Session};
use super::store::SessionStore;
use crate::credentials::UserId;

/// Raw refresh tokens carry 256 bits of entropy
const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate an opaque, unguessable refresh token (hex-encoded)
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a raw refresh token, hex-encoded; the only form ever stored
pub fn hash_refresh_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Owns every refresh-token state transition
#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn SessionStore>,
    refresh_ttl: Duration,
}

impl SessionLedger {
    /// Create a ledger; `refresh_ttl` is the lifetime given to rotated successors
    pub fn new(store: Arc<dyn SessionStore>, refresh_ttl: Duration) -> Self {
        Self { store, refresh_ttl }
    }

    /// Open a session for `user_id` and return it with its raw refresh token
    pub async fn create_session(
        &self,
        user_id: UserId,
        device: DeviceInfo,
        ttl: Duration,
    ) -> SessionResult<(Session, String)> {
        let raw = generate_refresh_token();
        let session = self
            .store
            .insert(NewSession {
                user_id,
                token_hash: hash_refresh_token(&raw),
                device,
                expires_at: Utc::now() + ttl,
            })
            .await?;

        tracing::debug!(session_id = %session.id, user_id = %user_id, "Session created");
        Ok((session, raw))
    }

    /// Consume `raw` and issue its successor.
    ///
    /// # Errors
    ///
    /// * `SessionError::Invalid` - unknown token
    /// * `SessionError::Expired` - session past expiry
    /// * `SessionError::Reused` - token already consumed or revoked; the caller
    ///   should treat the whole session family as compromised
    pub async fn rotate_session(&self, raw: &str) -> SessionResult<(Session, String)> {
        let now = Utc::now();
        let next_raw = generate_refresh_token();
        let next = self
            .store
            .rotate(
                &hash_refresh_token(raw),
                Rotation {
                    token_hash: hash_refresh_token(&next_raw),
                    expires_at: now + self.refresh_ttl,
                },
                now,
            )
            .await?;

        tracing::debug!(session_id = %next.id, user_id = %next.user_id, "Session rotated");
        Ok((next, next_raw))
    }

    /// Revoke one session or all of a user's sessions. Idempotent.
    pub async fn revoke_session(&self, target: RevokeTarget) -> SessionResult<u64> {
        let revoked = self.store.revoke(target, Utc::now()).await?;
        tracing::debug!(?target, revoked, "Sessions revoked");
        Ok(revoked)
    }

    /// Revoke the session a raw refresh token belongs to. Unknown tokens are a no-op.
    pub async fn revoke_by_token(&self, raw: &str) -> SessionResult<u64> {
        self.store.revoke_by_hash(&hash_refresh_token(raw), Utc::now()).await
    }

    /// Whether the session can still back a grant
    pub async fn is_session_active(&self, session_id: Uuid) -> SessionResult<bool> {
        Ok(self
            .store
            .find(session_id)
            .await?
            .is_some_and(|s| s.is_usable_at(Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySessionStore, SessionError};

    fn ledger() -> (SessionLedger, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (SessionLedger::new(store.clone(), Duration::days(7)), store)
    }

    fn device() -> DeviceInfo {
        DeviceInfo {
            user_agent: Some("test-agent".to_string()),
            ip_address: Some("10.0.0.1".to_string()),
        }
    }

    #[test]
    fn test_generated_tokens_are_unique_and_hex() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), REFRESH_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_is_stable_and_not_the_token() {
        let raw = generate_refresh_token();
        assert_eq!(hash_refresh_token(&raw), hash_refresh_token(&raw));
        assert_ne!(hash_refresh_token(&raw), raw);
    }

    #[tokio::test]
    async fn test_create_session_stores_only_hash() {
        let (ledger, _) = ledger();
        let user_id = Uuid::new_v4();
        let (session, raw) = ledger
            .create_session(user_id, device(), Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(session.user_id, user_id);
        assert!(session.is_active);
        assert_ne!(session.token_hash, raw);
        assert_eq!(session.token_hash, hash_refresh_token(&raw));
        assert!(ledger.is_session_active(session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rotation_is_single_use() {
        let (ledger, _) = ledger();
        let (first, raw) = ledger
            .create_session(Uuid::new_v4(), device(), Duration::hours(1))
            .await
            .unwrap();

        let (second, next_raw) = ledger.rotate_session(&raw).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.device, first.device);
        assert!(!ledger.is_session_active(first.id).await.unwrap());
        assert!(ledger.is_session_active(second.id).await.unwrap());

        let err = ledger.rotate_session(&raw).await.unwrap_err();
        assert!(matches!(err, SessionError::Reused { user_id } if user_id == first.user_id));

        // successor works exactly once
        ledger.rotate_session(&next_raw).await.unwrap();
        assert!(matches!(
            ledger.rotate_session(&next_raw).await,
            Err(SessionError::Reused { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let (ledger, _) = ledger();
        assert!(matches!(
            ledger.rotate_session("deadbeef").await,
            Err(SessionError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_expired() {
        let (ledger, store) = ledger();
        let (session, raw) = ledger
            .create_session(Uuid::new_v4(), device(), Duration::hours(1))
            .await
            .unwrap();
        store.set_expiry(session.id, Utc::now() - Duration::seconds(1));

        assert!(matches!(ledger.rotate_session(&raw).await, Err(SessionError::Expired)));
        assert!(!ledger.is_session_active(session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_session_is_expired() {
        let (ledger, _) = ledger();
        let (_, raw) = ledger
            .create_session(Uuid::new_v4(), device(), Duration::zero())
            .await
            .unwrap();
        assert!(matches!(ledger.rotate_session(&raw).await, Err(SessionError::Expired)));
    }

    #[tokio::test]
    async fn test_revoke_user_is_idempotent() {
        let (ledger, store) = ledger();
        let user_id = Uuid::new_v4();
        let (_, raw_a) = ledger.create_session(user_id, device(), Duration::hours(1)).await.unwrap();
        let (_, raw_b) = ledger.create_session(user_id, device(), Duration::hours(1)).await.unwrap();
        let (other, _) = ledger
            .create_session(Uuid::new_v4(), device(), Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(ledger.revoke_session(RevokeTarget::User(user_id)).await.unwrap(), 2);
        assert_eq!(ledger.revoke_session(RevokeTarget::User(user_id)).await.unwrap(), 0);
        assert_eq!(store.active_count(user_id), 0);
        assert!(ledger.is_session_active(other.id).await.unwrap());

        for raw in [raw_a, raw_b] {
            assert!(matches!(
                ledger.rotate_session(&raw).await,
                Err(SessionError::Reused { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_revoke_single_session() {
        let (ledger, _) = ledger();
        let user_id = Uuid::new_v4();
        let (a, _) = ledger.create_session(user_id, device(), Duration::hours(1)).await.unwrap();
        let (b, _) = ledger.create_session(user_id, device(), Duration::hours(1)).await.unwrap();

        assert_eq!(ledger.revoke_session(RevokeTarget::Session(a.id)).await.unwrap(), 1);
        assert!(!ledger.is_session_active(a.id).await.unwrap());
        assert!(ledger.is_session_active(b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_by_token() {
        let (ledger, _) = ledger();
        let (session, raw) = ledger
            .create_session(Uuid::new_v4(), device(), Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(ledger.revoke_by_token(&raw).await.unwrap(), 1);
        assert_eq!(ledger.revoke_by_token(&raw).await.unwrap(), 0);
        assert_eq!(ledger.revoke_by_token("unknown").await.unwrap(), 0);
        assert!(!ledger.is_session_active(session.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_has_one_winner() {
        let (ledger, _) = ledger();
        let (_, raw) = ledger
            .create_session(Uuid::new_v4(), device(), Duration::hours(1))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            let raw = raw.clone();
            handles.push(tokio::spawn(async move { ledger.rotate_session(&raw).await }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(SessionError::Reused { .. }) | Err(SessionError::Invalid) => {}
                Err(other) => panic!("unexpected rotation outcome: {other:?}"),
            }
        }
        assert_eq!(successes, 1);
    }
}
