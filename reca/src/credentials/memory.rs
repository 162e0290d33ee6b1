//! In-process credential store.
//!
//! Backs the engine in tests and local development. A single mutex guards
//! users and identities together, so every operation is atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::errors::{CredentialError, CredentialResult};
use super::models::{AuthIdentity, AuthProvider, IdentityLink, NewUser, User, UserId, normalize_email};
use super::store::CredentialStore;
use crate::oauth::ProviderTokens;

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    identities: HashMap<Uuid, AuthIdentity>,
}

impl State {
    fn live_user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.deleted_at.is_none() && u.email == email)
    }

    fn live_identity(&self, provider: AuthProvider, provider_user_id: &str) -> Option<&AuthIdentity> {
        self.identities.values().find(|i| {
            i.deleted_at.is_none() && i.provider == provider && i.provider_user_id == provider_user_id
        })
    }
}

/// Mutex-backed `CredentialStore`
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<State>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Flip a user's active flag
    pub fn set_active(&self, user_id: UserId, active: bool) {
        if let Some(user) = self.state().users.get_mut(&user_id) {
            user.is_active = active;
            user.updated_at = Utc::now();
        }
    }

    /// Number of live identities across all users
    pub fn identity_count(&self) -> usize {
        self.state()
            .identities
            .values()
            .filter(|i| i.deleted_at.is_none())
            .count()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> CredentialResult<User> {
        let email = normalize_email(email);
        self.state()
            .live_user_by_email(&email)
            .cloned()
            .ok_or(CredentialError::NotFound)
    }

    async fn find_user_by_id(&self, user_id: UserId) -> CredentialResult<User> {
        self.state()
            .users
            .get(&user_id)
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .ok_or(CredentialError::NotFound)
    }

    async fn create_user(&self, new_user: NewUser) -> CredentialResult<User> {
        let email = normalize_email(&new_user.email);
        let mut state = self.state();

        if state.live_user_by_email(&email).is_some() {
            return Err(CredentialError::Conflict("email already registered".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash: new_user.password_hash.clone(),
            is_active: true,
            email_verified: new_user.email_verified,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        if let Some(hash) = new_user.password_hash {
            let identity = AuthIdentity {
                id: Uuid::new_v4(),
                user_id: user.id,
                provider: AuthProvider::Password,
                provider_user_id: user.id.to_string(),
                email,
                password_hash: Some(hash),
                is_active: true,
                email_verified: new_user.email_verified,
                provider_tokens: None,
                created_at: now,
                deleted_at: None,
            };
            state.identities.insert(identity.id, identity);
        }

        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn link_identity(&self, user_id: UserId, link: IdentityLink) -> CredentialResult<AuthIdentity> {
        if !link.provider.is_oauth() {
            return Err(CredentialError::Conflict(
                "password identity is managed with the user record".to_string(),
            ));
        }

        let mut state = self.state();
        if !state.users.contains_key(&user_id) {
            return Err(CredentialError::NotFound);
        }
        if state.live_identity(link.provider, &link.provider_user_id).is_some() {
            return Err(CredentialError::Conflict(format!(
                "{} account already linked",
                link.provider
            )));
        }

        let identity = AuthIdentity {
            id: Uuid::new_v4(),
            user_id,
            provider: link.provider,
            provider_user_id: link.provider_user_id,
            email: normalize_email(&link.email),
            password_hash: None,
            is_active: true,
            email_verified: link.email_verified,
            provider_tokens: None,
            created_at: Utc::now(),
            deleted_at: None,
        };
        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn find_identity(
        &self,
        provider: AuthProvider,
        provider_user_id: &str,
    ) -> CredentialResult<AuthIdentity> {
        self.state()
            .live_identity(provider, provider_user_id)
            .cloned()
            .ok_or(CredentialError::NotFound)
    }

    async fn list_identities(&self, user_id: UserId) -> CredentialResult<Vec<AuthIdentity>> {
        let mut identities: Vec<AuthIdentity> = self
            .state()
            .identities
            .values()
            .filter(|i| i.user_id == user_id && i.deleted_at.is_none())
            .cloned()
            .collect();
        identities.sort_by_key(|i| i.created_at);
        Ok(identities)
    }

    async fn store_provider_tokens(
        &self,
        identity_id: Uuid,
        tokens: &ProviderTokens,
    ) -> CredentialResult<()> {
        let mut state = self.state();
        let identity = state
            .identities
            .get_mut(&identity_id)
            .filter(|i| i.deleted_at.is_none())
            .ok_or(CredentialError::NotFound)?;

        let refresh_token = tokens.refresh_token.clone().or_else(|| {
            identity
                .provider_tokens
                .as_ref()
                .and_then(|t| t.refresh_token.clone())
        });
        identity.provider_tokens = Some(ProviderTokens {
            access_token: tokens.access_token.clone(),
            refresh_token,
            expires_at: tokens.expires_at,
        });
        Ok(())
    }

    async fn unlink_identity(&self, user_id: UserId, provider: AuthProvider) -> CredentialResult<()> {
        let mut state = self.state();
        let now = Utc::now();
        let mut affected = 0;

        for identity in state.identities.values_mut() {
            if identity.user_id == user_id && identity.provider == provider && identity.deleted_at.is_none() {
                identity.deleted_at = Some(now);
                identity.is_active = false;
                affected += 1;
            }
        }
        if affected == 0 {
            return Err(CredentialError::NotFound);
        }

        if provider == AuthProvider::Password {
            if let Some(user) = state.users.get_mut(&user_id) {
                user.password_hash = None;
                user.updated_at = now;
            }
        }
        Ok(())
    }

    async fn soft_delete_user(&self, user_id: UserId) -> CredentialResult<()> {
        let mut state = self.state();
        let now = Utc::now();

        let user = state
            .users
            .get_mut(&user_id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or(CredentialError::NotFound)?;
        user.deleted_at = Some(now);
        user.is_active = false;
        user.updated_at = now;

        for identity in state.identities.values_mut() {
            if identity.user_id == user_id && identity.deleted_at.is_none() {
                identity.deleted_at = Some(now);
                identity.is_active = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: Some("$argon2id$fake".to_string()),
            email_verified: false,
        }
    }

    fn google_link(sub: &str, email: &str) -> IdentityLink {
        IdentityLink {
            provider: AuthProvider::Google,
            provider_user_id: sub.to_string(),
            email: email.to_string(),
            email_verified: true,
        }
    }

    #[tokio::test]
    async fn test_create_user_normalizes_email_and_adds_password_identity() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(password_user("  A@X.com ")).await.unwrap();

        assert_eq!(user.email, "a@x.com");
        let found = store.find_user_by_email("a@X.COM").await.unwrap();
        assert_eq!(found.id, user.id);

        let identities = store.list_identities(user.id).await.unwrap();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].provider, AuthProvider::Password);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryCredentialStore::new();
        store.create_user(password_user("a@x.com")).await.unwrap();
        let err = store.create_user(password_user("A@x.com")).await.unwrap_err();
        assert!(matches!(err, CredentialError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_oauth_only_user_has_no_identity_until_linked() {
        let store = MemoryCredentialStore::new();
        let user = store
            .create_user(NewUser {
                email: "b@x.com".to_string(),
                password_hash: None,
                email_verified: true,
            })
            .await
            .unwrap();
        assert!(store.list_identities(user.id).await.unwrap().is_empty());

        let identity = store.link_identity(user.id, google_link("g1", "b@x.com")).await.unwrap();
        let found = store.find_identity(AuthProvider::Google, "g1").await.unwrap();
        assert_eq!(found.id, identity.id);
        assert_eq!(found.user_id, user.id);
    }

    #[tokio::test]
    async fn test_provider_subject_is_unique() {
        let store = MemoryCredentialStore::new();
        let first = store.create_user(password_user("a@x.com")).await.unwrap();
        let second = store.create_user(password_user("c@x.com")).await.unwrap();

        store.link_identity(first.id, google_link("g1", "a@x.com")).await.unwrap();
        let err = store
            .link_identity(second.id, google_link("g1", "c@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_password_identity_cannot_be_linked_separately() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(password_user("a@x.com")).await.unwrap();
        let err = store
            .link_identity(
                user.id,
                IdentityLink {
                    provider: AuthProvider::Password,
                    provider_user_id: "x".to_string(),
                    email: "a@x.com".to_string(),
                    email_verified: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unlink_is_soft_and_frees_the_subject() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(password_user("a@x.com")).await.unwrap();
        store.link_identity(user.id, google_link("g1", "a@x.com")).await.unwrap();

        store.unlink_identity(user.id, AuthProvider::Google).await.unwrap();
        assert!(matches!(
            store.find_identity(AuthProvider::Google, "g1").await,
            Err(CredentialError::NotFound)
        ));
        assert!(matches!(
            store.unlink_identity(user.id, AuthProvider::Google).await,
            Err(CredentialError::NotFound)
        ));

        // the subject can be linked again after unlinking
        store.link_identity(user.id, google_link("g1", "a@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_unlink_password_clears_user_hash() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(password_user("a@x.com")).await.unwrap();
        store.unlink_identity(user.id, AuthProvider::Password).await.unwrap();

        let user = store.find_user_by_id(user.id).await.unwrap();
        assert!(user.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_provider_tokens_keep_previous_refresh_token() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(password_user("a@x.com")).await.unwrap();
        let identity = store.link_identity(user.id, google_link("g1", "a@x.com")).await.unwrap();

        store
            .store_provider_tokens(
                identity.id,
                &ProviderTokens {
                    access_token: "at1".to_string(),
                    refresh_token: Some("rt1".to_string()),
                    expires_at: None,
                },
            )
            .await
            .unwrap();
        store
            .store_provider_tokens(
                identity.id,
                &ProviderTokens {
                    access_token: "at2".to_string(),
                    refresh_token: None,
                    expires_at: None,
                },
            )
            .await
            .unwrap();

        let identity = store.find_identity(AuthProvider::Google, "g1").await.unwrap();
        let tokens = identity.provider_tokens.unwrap();
        assert_eq!(tokens.access_token, "at2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt1"));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_user_and_identities() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(password_user("a@x.com")).await.unwrap();
        store.link_identity(user.id, google_link("g1", "a@x.com")).await.unwrap();

        store.soft_delete_user(user.id).await.unwrap();

        assert!(matches!(store.find_user_by_id(user.id).await, Err(CredentialError::NotFound)));
        assert!(matches!(
            store.find_user_by_email("a@x.com").await,
            Err(CredentialError::NotFound)
        ));
        assert_eq!(store.identity_count(), 0);

        // email is free again for a new signup
        store.create_user(password_user("a@x.com")).await.unwrap();
    }
}
