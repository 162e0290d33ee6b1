//! Session persistence contract and its PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use super::errors::{SessionError, SessionResult};
use super::models::{DeviceInfo, NewSession, RevokeTarget, Rotation, Session};
use crate::db::timeouts::{with_default_timeout, with_transaction_timeout};

/// Storage for session records.
///
/// `rotate` must be linearizable per token hash: of any number of concurrent
/// rotations of the same token, at most one succeeds.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a fresh active session
    async fn insert(&self, session: NewSession) -> SessionResult<Session>;

    /// Atomically consume the session identified by `token_hash` and create
    /// its successor.
    ///
    /// # Errors
    ///
    /// * `SessionError::Invalid` - no session has this hash
    /// * `SessionError::Expired` - the session is past its expiry
    /// * `SessionError::Reused` - the session was already rotated or revoked
    async fn rotate(&self, token_hash: &str, successor: Rotation, now: DateTime<Utc>) -> SessionResult<Session>;

    /// Deactivate one or all sessions of a user; returns the number newly revoked
    async fn revoke(&self, target: RevokeTarget, now: DateTime<Utc>) -> SessionResult<u64>;

    /// Deactivate the session identified by `token_hash`; returns the number newly revoked
    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> SessionResult<u64>;

    /// Look up a session by ID
    async fn find(&self, session_id: Uuid) -> SessionResult<Option<Session>>;
}

const SESSION_COLUMNS: &str = "id, user_id, token_hash, user_agent, ip_address, is_active, expires_at, \
     created_at, rotated_at, replaced_by, revoked_at, deleted_at";

/// PostgreSQL implementation of `SessionStore`
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        device: DeviceInfo {
            user_agent: row.try_get("user_agent")?,
            ip_address: row.try_get("ip_address")?,
        },
        is_active: row.try_get("is_active")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        rotated_at: row.try_get("rotated_at")?,
        replaced_by: row.try_get("replaced_by")?,
        revoked_at: row.try_get("revoked_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Body of a rotation. The outer `Result` carries database failures, the
/// inner one the ledger outcome; on an inner error the transaction is dropped
/// and rolled back.
async fn rotate_in_tx(
    mut tx: Transaction<'_, Postgres>,
    token_hash: &str,
    successor: Rotation,
    now: DateTime<Utc>,
) -> Result<SessionResult<Session>, sqlx::Error> {
    let select = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions \
         WHERE token_hash = $1 AND deleted_at IS NULL FOR UPDATE"
    );
    let Some(row) = sqlx::query(&select)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Ok(Err(SessionError::Invalid));
    };
    let current = session_from_row(&row)?;

    if current.is_expired_at(now) {
        return Ok(Err(SessionError::Expired));
    }
    if !current.is_active || current.revoked_at.is_some() {
        return Ok(Err(SessionError::Reused {
            user_id: current.user_id,
        }));
    }

    let insert = format!(
        "INSERT INTO sessions (id, user_id, token_hash, user_agent, ip_address, expires_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {SESSION_COLUMNS}"
    );
    let row = sqlx::query(&insert)
        .bind(Uuid::new_v4())
        .bind(current.user_id)
        .bind(&successor.token_hash)
        .bind(&current.device.user_agent)
        .bind(&current.device.ip_address)
        .bind(successor.expires_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
    let next = session_from_row(&row)?;

    // Guarded update: a concurrent consumer that slipped past the row lock
    // leaves zero rows to update here.
    let consumed = sqlx::query(
        "UPDATE sessions SET is_active = FALSE, rotated_at = $2, replaced_by = $3 \
         WHERE id = $1 AND is_active",
    )
    .bind(current.id)
    .bind(now)
    .bind(next.id)
    .execute(&mut *tx)
    .await?;

    if consumed.rows_affected() != 1 {
        return Ok(Err(SessionError::Reused {
            user_id: current.user_id,
        }));
    }

    tx.commit().await?;
    Ok(Ok(next))
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: NewSession) -> SessionResult<Session> {
        let query = format!(
            "INSERT INTO sessions (id, user_id, token_hash, user_agent, ip_address, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SESSION_COLUMNS}"
        );
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(session.user_id)
                .bind(&session.token_hash)
                .bind(&session.device.user_agent)
                .bind(&session.device.ip_address)
                .bind(session.expires_at)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(session_from_row(&row)?)
    }

    async fn rotate(&self, token_hash: &str, successor: Rotation, now: DateTime<Utc>) -> SessionResult<Session> {
        with_transaction_timeout(async {
            let tx = self.pool.begin().await?;
            rotate_in_tx(tx, token_hash, successor, now).await
        })
        .await?
    }

    async fn revoke(&self, target: RevokeTarget, now: DateTime<Utc>) -> SessionResult<u64> {
        let (filter, id) = match target {
            RevokeTarget::Session(id) => ("id = $1", id),
            RevokeTarget::User(user_id) => ("user_id = $1", user_id),
        };
        let query = format!(
            "UPDATE sessions SET is_active = FALSE, revoked_at = $2 WHERE {filter} AND is_active"
        );
        let result = with_default_timeout(
            sqlx::query(&query)
                .bind(id)
                .bind(now)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> SessionResult<u64> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE sessions SET is_active = FALSE, revoked_at = $2 \
                 WHERE token_hash = $1 AND is_active",
            )
            .bind(token_hash)
            .bind(now)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }

    async fn find(&self, session_id: Uuid) -> SessionResult<Option<Session>> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1");
        let row = with_default_timeout(sqlx::query(&query).bind(session_id).fetch_optional(&self.pool)).await?;

        Ok(row.as_ref().map(session_from_row).transpose()?)
    }
}
