//! Session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credentials::UserId;

/// Client metadata recorded with a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// One outstanding refresh-token grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: UserId,
    /// SHA-256 of the raw refresh token; the raw value is never stored
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub device: DeviceInfo,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    /// Successor created when this session was rotated
    pub replaced_by: Option<Uuid>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Active, never revoked, not deleted, not expired
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.revoked_at.is_none()
            && self.deleted_at.is_none()
            && !self.is_expired_at(now)
    }
}

/// A session about to be inserted
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: UserId,
    pub token_hash: String,
    pub device: DeviceInfo,
    pub expires_at: DateTime<Utc>,
}

/// Replacement token for a rotation
#[derive(Debug, Clone)]
pub struct Rotation {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Scope of a revocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeTarget {
    /// A single session
    Session(Uuid),
    /// Every session of a user
    User(UserId),
}
