//! Credential store contract and its PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::errors::{CredentialError, CredentialResult};
use super::models::{AuthIdentity, AuthProvider, IdentityLink, NewUser, User, UserId, normalize_email};
use crate::db::timeouts::{with_default_timeout, with_transaction_timeout};
use crate::oauth::ProviderTokens;

/// Persistence contract for users and their provider identities.
///
/// Every write is durable before the call returns. Lookups never return
/// soft-deleted rows.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a live user by email (case-insensitive)
    async fn find_user_by_email(&self, email: &str) -> CredentialResult<User>;

    /// Find a live user by ID
    async fn find_user_by_id(&self, user_id: UserId) -> CredentialResult<User>;

    /// Create a user; a `PASSWORD` identity is created alongside when a hash is given
    async fn create_user(&self, new_user: NewUser) -> CredentialResult<User>;

    /// Link an external provider identity to a user
    async fn link_identity(&self, user_id: UserId, link: IdentityLink) -> CredentialResult<AuthIdentity>;

    /// Find a live identity by provider and provider-side user ID
    async fn find_identity(
        &self,
        provider: AuthProvider,
        provider_user_id: &str,
    ) -> CredentialResult<AuthIdentity>;

    /// All live identities of a user
    async fn list_identities(&self, user_id: UserId) -> CredentialResult<Vec<AuthIdentity>>;

    /// Persist the provider's OAuth tokens on the identity
    async fn store_provider_tokens(
        &self,
        identity_id: Uuid,
        tokens: &ProviderTokens,
    ) -> CredentialResult<()>;

    /// Soft-delete the user's identity for `provider`
    async fn unlink_identity(&self, user_id: UserId, provider: AuthProvider) -> CredentialResult<()>;

    /// Soft-delete the user together with all of its identities
    async fn soft_delete_user(&self, user_id: UserId) -> CredentialResult<()>;
}

const USER_COLUMNS: &str = "id, email, password_hash, is_active, email_verified, created_at, updated_at, deleted_at";

const IDENTITY_COLUMNS: &str = "id, user_id, provider, provider_user_id, email, password_hash, is_active, \
     email_verified, provider_access_token, provider_refresh_token, provider_token_expires_at, \
     created_at, deleted_at";

/// PostgreSQL implementation of `CredentialStore`
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        email_verified: row.try_get("email_verified")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn identity_from_row(row: &PgRow) -> Result<AuthIdentity, sqlx::Error> {
    let provider: String = row.try_get("provider")?;
    let provider = provider
        .parse::<AuthProvider>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let access_token: Option<String> = row.try_get("provider_access_token")?;
    let refresh_token: Option<String> = row.try_get("provider_refresh_token")?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("provider_token_expires_at")?;

    Ok(AuthIdentity {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        provider,
        provider_user_id: row.try_get("provider_user_id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        email_verified: row.try_get("email_verified")?,
        provider_tokens: access_token.map(|access_token| ProviderTokens {
            access_token,
            refresh_token,
            expires_at,
        }),
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> CredentialResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL");
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(normalize_email(email))
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(CredentialError::NotFound)?;

        Ok(user_from_row(&row)?)
    }

    async fn find_user_by_id(&self, user_id: UserId) -> CredentialResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = with_default_timeout(sqlx::query(&query).bind(user_id).fetch_optional(&self.pool))
            .await?
            .ok_or(CredentialError::NotFound)?;

        Ok(user_from_row(&row)?)
    }

    async fn create_user(&self, new_user: NewUser) -> CredentialResult<User> {
        let email = normalize_email(&new_user.email);
        let user_id = Uuid::new_v4();

        let result = with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let insert_user = format!(
                "INSERT INTO users (id, email, password_hash, email_verified) \
                 VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
            );
            let row = sqlx::query(&insert_user)
                .bind(user_id)
                .bind(&email)
                .bind(&new_user.password_hash)
                .bind(new_user.email_verified)
                .fetch_one(&mut *tx)
                .await?;

            if let Some(hash) = &new_user.password_hash {
                sqlx::query(
                    "INSERT INTO auth_identities \
                     (id, user_id, provider, provider_user_id, email, password_hash, email_verified) \
                     VALUES ($1, $2, 'PASSWORD', $3, $4, $5, $6)",
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(user_id.to_string())
                .bind(&email)
                .bind(hash)
                .bind(new_user.email_verified)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<_, sqlx::Error>(user_from_row(&row)?)
        })
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if e.is_unique_violation() => {
                Err(CredentialError::Conflict("email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn link_identity(&self, user_id: UserId, link: IdentityLink) -> CredentialResult<AuthIdentity> {
        if !link.provider.is_oauth() {
            return Err(CredentialError::Conflict(
                "password identity is managed with the user record".to_string(),
            ));
        }

        let query = format!(
            "INSERT INTO auth_identities \
             (id, user_id, provider, provider_user_id, email, email_verified) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {IDENTITY_COLUMNS}"
        );
        let result = with_default_timeout(
            sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(link.provider.as_str())
                .bind(&link.provider_user_id)
                .bind(normalize_email(&link.email))
                .bind(link.email_verified)
                .fetch_one(&self.pool),
        )
        .await;

        match result {
            Ok(row) => Ok(identity_from_row(&row)?),
            Err(e) if e.is_unique_violation() => Err(CredentialError::Conflict(format!(
                "{} account already linked",
                link.provider
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_identity(
        &self,
        provider: AuthProvider,
        provider_user_id: &str,
    ) -> CredentialResult<AuthIdentity> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM auth_identities \
             WHERE provider = $1 AND provider_user_id = $2 AND deleted_at IS NULL"
        );
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(provider.as_str())
                .bind(provider_user_id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(CredentialError::NotFound)?;

        Ok(identity_from_row(&row)?)
    }

    async fn list_identities(&self, user_id: UserId) -> CredentialResult<Vec<AuthIdentity>> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM auth_identities \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at"
        );
        let rows = with_default_timeout(sqlx::query(&query).bind(user_id).fetch_all(&self.pool)).await?;

        Ok(rows
            .iter()
            .map(identity_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn store_provider_tokens(
        &self,
        identity_id: Uuid,
        tokens: &ProviderTokens,
    ) -> CredentialResult<()> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE auth_identities \
                 SET provider_access_token = $2, provider_refresh_token = COALESCE($3, provider_refresh_token), \
                     provider_token_expires_at = $4, updated_at = NOW() \
                 WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(identity_id)
            .bind(&tokens.access_token)
            .bind(&tokens.refresh_token)
            .bind(tokens.expires_at)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound);
        }
        Ok(())
    }

    async fn unlink_identity(&self, user_id: UserId, provider: AuthProvider) -> CredentialResult<()> {
        let affected = with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "UPDATE auth_identities SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() \
                 WHERE user_id = $1 AND provider = $2 AND deleted_at IS NULL",
            )
            .bind(user_id)
            .bind(provider.as_str())
            .execute(&mut *tx)
            .await?;

            if provider == AuthProvider::Password {
                sqlx::query("UPDATE users SET password_hash = NULL, updated_at = NOW() WHERE id = $1")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(CredentialError::NotFound);
        }
        Ok(())
    }

    async fn soft_delete_user(&self, user_id: UserId) -> CredentialResult<()> {
        let affected = with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "UPDATE users SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() \
                 WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE auth_identities SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() \
                 WHERE user_id = $1 AND deleted_at IS NULL",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(CredentialError::NotFound);
        }
        Ok(())
    }
}
