//! In-process session store.
//!
//! The whole read-modify-write of a rotation happens under one mutex, which
//! gives the same single-winner guarantee the row lock gives in PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::errors::{SessionError, SessionResult};
use super::models::{NewSession, RevokeTarget, Rotation, Session};
use super::store::SessionStore;
use crate::credentials::UserId;

#[derive(Default)]
struct State {
    sessions: HashMap<Uuid, Session>,
    by_hash: HashMap<String, Uuid>,
}

impl State {
    fn insert(&mut self, session: Session) {
        self.by_hash.insert(session.token_hash.clone(), session.id);
        self.sessions.insert(session.id, session);
    }

    fn revoke_where(&mut self, now: DateTime<Utc>, pred: impl Fn(&Session) -> bool) -> u64 {
        let mut revoked = 0;
        for session in self.sessions.values_mut() {
            if session.is_active && pred(session) {
                session.is_active = false;
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        revoked
    }
}

/// Mutex-backed `SessionStore`
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<State>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of active sessions held by `user_id`
    pub fn active_count(&self, user_id: UserId) -> usize {
        self.state()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .count()
    }

    /// Move a session's expiry, for exercising expiry paths
    pub fn set_expiry(&self, session_id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(session) = self.state().sessions.get_mut(&session_id) {
            session.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: NewSession) -> SessionResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            token_hash: session.token_hash,
            device: session.device,
            is_active: true,
            expires_at: session.expires_at,
            created_at: Utc::now(),
            rotated_at: None,
            replaced_by: None,
            revoked_at: None,
            deleted_at: None,
        };
        self.state().insert(session.clone());
        Ok(session)
    }

    async fn rotate(&self, token_hash: &str, successor: Rotation, now: DateTime<Utc>) -> SessionResult<Session> {
        let mut state = self.state();

        let current = state
            .by_hash
            .get(token_hash)
            .and_then(|id| state.sessions.get(id))
            .filter(|s| s.deleted_at.is_none())
            .cloned()
            .ok_or(SessionError::Invalid)?;

        if current.is_expired_at(now) {
            return Err(SessionError::Expired);
        }
        if !current.is_active || current.revoked_at.is_some() {
            return Err(SessionError::Reused {
                user_id: current.user_id,
            });
        }

        let next = Session {
            id: Uuid::new_v4(),
            user_id: current.user_id,
            token_hash: successor.token_hash,
            device: current.device.clone(),
            is_active: true,
            expires_at: successor.expires_at,
            created_at: now,
            rotated_at: None,
            replaced_by: None,
            revoked_at: None,
            deleted_at: None,
        };

        if let Some(old) = state.sessions.get_mut(&current.id) {
            old.is_active = false;
            old.rotated_at = Some(now);
            old.replaced_by = Some(next.id);
        }
        state.insert(next.clone());
        Ok(next)
    }

    async fn revoke(&self, target: RevokeTarget, now: DateTime<Utc>) -> SessionResult<u64> {
        let mut state = self.state();
        let revoked = match target {
            RevokeTarget::Session(id) => state.revoke_where(now, |s| s.id == id),
            RevokeTarget::User(user_id) => state.revoke_where(now, |s| s.user_id == user_id),
        };
        Ok(revoked)
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> SessionResult<u64> {
        let mut state = self.state();
        let Some(id) = state.by_hash.get(token_hash).copied() else {
            return Ok(0);
        };
        Ok(state.revoke_where(now, |s| s.id == id))
    }

    async fn find(&self, session_id: Uuid) -> SessionResult<Option<Session>> {
        Ok(self.state().sessions.get(&session_id).cloned())
    }
}
