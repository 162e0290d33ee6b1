//! Argon2id password hashing with a server-side pepper.
//!
//! Hashing and verification are CPU-bound, so both run on tokio's blocking
//! pool and never stall the request-accept path.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};
use std::sync::{Arc, OnceLock};

use super::errors::{CredentialError, CredentialResult};
use super::models::User;

/// Hashes and verifies user passwords
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: Arc<str>,
    params: Params,
    /// Hash checked when the account does not exist, so unknown emails cost
    /// the same as wrong passwords
    dummy_hash: Arc<OnceLock<String>>,
}

impl PasswordHasher {
    /// Create a hasher with the default Argon2id cost parameters
    pub fn new(pepper: impl Into<String>) -> Self {
        Self::with_params(pepper, Params::default())
    }

    /// Create a hasher with explicit cost parameters
    pub fn with_params(pepper: impl Into<String>, params: Params) -> Self {
        Self {
            pepper: Arc::from(pepper.into()),
            params,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash a plaintext password into a PHC string
    pub async fn hash(&self, plaintext: &str) -> CredentialResult<String> {
        let pepper = self.pepper.clone();
        let params = self.params.clone();
        let plaintext = plaintext.to_string();

        tokio::task::spawn_blocking(move || hash_blocking(&pepper, params, &plaintext))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }

    /// Verify a plaintext password against the user's stored hash.
    ///
    /// Returns `false` for users without a password (OAuth-only) and for
    /// unparseable stored hashes. Comparison is constant-time inside argon2.
    pub async fn verify_password(&self, user: &User, plaintext: &str) -> CredentialResult<bool> {
        match &user.password_hash {
            Some(hash) => self.verify_hash(hash, plaintext).await,
            None => {
                self.verify_dummy(plaintext).await?;
                Ok(false)
            }
        }
    }

    /// Burn one verification against a throwaway hash
    pub async fn verify_dummy(&self, plaintext: &str) -> CredentialResult<()> {
        let dummy = match self.dummy_hash.get() {
            Some(hash) => hash.clone(),
            None => {
                let hash = self.hash("reca-dummy-password").await?;
                self.dummy_hash.get_or_init(|| hash).clone()
            }
        };
        self.verify_hash(&dummy, plaintext).await?;
        Ok(())
    }

    async fn verify_hash(&self, hash: &str, plaintext: &str) -> CredentialResult<bool> {
        let pepper = self.pepper.clone();
        let hash = hash.to_string();
        let plaintext = plaintext.to_string();

        tokio::task::spawn_blocking(move || verify_blocking(&pepper, &hash, &plaintext))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }
}

fn hash_blocking(pepper: &str, params: Params, plaintext: &str) -> CredentialResult<String> {
    let peppered = format!("{plaintext}{pepper}");
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password(peppered.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

fn verify_blocking(pepper: &str, hash: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    let peppered = format!("{plaintext}{pepper}");
    Argon2::default()
        .verify_password(peppered.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
pub(crate) fn fast_params() -> Params {
    Params::new(1024, 1, 1, None).expect("valid argon2 params")
}
