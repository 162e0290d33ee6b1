//! Auth engine: orchestrates login, signup, refresh, logout and identity
//! management over the credential store, token codec, session ledger and
//! OAuth providers.

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::{AuthError, AuthResult};
use super::models::{
    LoginRequest, LoginStage, LogoutTarget, OAuthCallbackRequest, SessionTokens, SignupRequest,
};
use crate::credentials::{
    AuthIdentity, AuthProvider, CredentialError, CredentialStore, IdentityLink, NewUser,
    PasswordHasher, User, UserId, normalize_email,
};
use crate::oauth::{DEFAULT_RETRY_BACKOFF, OAuthProviders, ProviderError, ProviderProfile, with_retry};
use crate::session::{DeviceInfo, RevokeTarget, SessionError, SessionLedger};
use crate::token::{AccessClaims, ClaimSet, TokenCodec};

/// Token lifetimes and retry policy
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub retry_backoff: std::time::Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Tracks one login attempt through its stages
struct LoginAttempt {
    method: &'static str,
    stage: LoginStage,
}

impl LoginAttempt {
    fn start(method: &'static str) -> Self {
        tracing::debug!(method, stage = %LoginStage::Received, "Login attempt");
        Self {
            method,
            stage: LoginStage::Received,
        }
    }

    fn advance(&mut self, next: LoginStage) {
        debug_assert!(self.stage.can_advance_to(next), "{} -> {}", self.stage, next);
        tracing::debug!(method = self.method, from = %self.stage, to = %next, "Login stage");
        self.stage = next;
    }

    fn reject(&mut self, err: AuthError) -> AuthError {
        tracing::debug!(method = self.method, from = %self.stage, error = %err, "Login rejected");
        self.stage = LoginStage::Rejected;
        err
    }
}

/// Authentication engine
#[derive(Clone)]
pub struct AuthEngine {
    credentials: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    codec: Arc<TokenCodec>,
    sessions: SessionLedger,
    providers: OAuthProviders,
    settings: EngineSettings,
}

impl AuthEngine {
    /// Create a new authentication engine
    ///
    /// # Arguments
    ///
    /// * `credentials` - User and identity store
    /// * `hasher` - Peppered Argon2id hasher
    /// * `codec` - Access-token signer shared across the process
    /// * `sessions` - Refresh-token ledger
    /// * `providers` - Configured OAuth provider clients
    /// * `settings` - Token lifetimes and provider retry backoff
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        codec: Arc<TokenCodec>,
        sessions: SessionLedger,
        providers: OAuthProviders,
        settings: EngineSettings,
    ) -> Self {
        Self {
            credentials,
            hasher,
            codec,
            sessions,
            providers,
            settings,
        }
    }

    pub fn providers(&self) -> &OAuthProviders {
        &self.providers
    }

    /// Log in with email and password
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Empty email or password
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    /// * `AuthError::AccountInactive` - Correct password on a deactivated account
    pub async fn login_with_password(
        &self,
        request: LoginRequest,
        device: DeviceInfo,
    ) -> AuthResult<SessionTokens> {
        let mut attempt = LoginAttempt::start("password");

        if let Err(err) = request.validate() {
            return Err(attempt.reject(err));
        }
        attempt.advance(LoginStage::Validated);

        let user = match self.credentials.find_user_by_email(&request.email).await {
            Ok(user) => user,
            Err(CredentialError::NotFound) => {
                // Same cost as a wrong password
                self.hasher.verify_dummy(&request.password).await?;
                return Err(attempt.reject(AuthError::InvalidCredentials));
            }
            Err(err) => return Err(attempt.reject(err.into())),
        };

        if !self.hasher.verify_password(&user, &request.password).await? {
            return Err(attempt.reject(AuthError::InvalidCredentials));
        }
        if !user.can_sign_in() {
            return Err(attempt.reject(AuthError::AccountInactive));
        }
        attempt.advance(LoginStage::IdentityResolved);

        let tokens = self
            .issue_session(&user, device)
            .await
            .map_err(|e| attempt.reject(e))?;
        attempt.advance(LoginStage::SessionIssued);

        tracing::info!(user_id = %user.id, "Password login succeeded");
        Ok(tokens)
    }

    /// Complete an OAuth authorization-code login
    ///
    /// The code exchange and the userinfo fetch are each retried once on
    /// transient provider failures.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Missing or non-OAuth provider, empty code or redirect URI
    /// * `AuthError::InvalidCredentials` - Provider refused the code (bad, expired or replayed)
    /// * `AuthError::Provider` - Provider unreachable, failing, or not configured
    /// * `AuthError::Conflict` - Email belongs to an account and the provider did not verify it
    /// * `AuthError::AccountInactive` - Linked account is deactivated
    pub async fn login_with_oauth(
        &self,
        request: OAuthCallbackRequest,
        device: DeviceInfo,
    ) -> AuthResult<SessionTokens> {
        let mut attempt = LoginAttempt::start("oauth");

        let provider = request.validate().map_err(|e| attempt.reject(e))?;
        attempt.advance(LoginStage::Validated);

        let client = self
            .providers
            .get(provider)
            .map_err(|e| attempt.reject(e.into()))?;
        let client = client.as_ref();
        let backoff = self.settings.retry_backoff;

        let provider_tokens = with_retry("exchange_code", backoff, || {
            client.exchange_code(&request.code, &request.redirect_uri)
        })
        .await
        .map_err(|e| attempt.reject(code_exchange_error(e)))?;

        let profile = with_retry("fetch_user_info", backoff, || {
            client.fetch_user_info(&provider_tokens)
        })
        .await
        .map_err(|e| attempt.reject(e.into()))?;

        let (user, identity) = self
            .resolve_identity(provider, &profile)
            .await
            .map_err(|e| attempt.reject(e))?;

        self.credentials
            .store_provider_tokens(identity.id, &provider_tokens)
            .await
            .map_err(|e| attempt.reject(e.into()))?;

        if !user.can_sign_in() {
            return Err(attempt.reject(AuthError::AccountInactive));
        }
        attempt.advance(LoginStage::IdentityResolved);

        let tokens = self
            .issue_session(&user, device)
            .await
            .map_err(|e| attempt.reject(e))?;
        attempt.advance(LoginStage::SessionIssued);

        tracing::info!(user_id = %user.id, %provider, "OAuth login succeeded");
        Ok(tokens)
    }

    /// Find the user behind a provider profile, linking or creating as needed
    async fn resolve_identity(
        &self,
        provider: AuthProvider,
        profile: &ProviderProfile,
    ) -> AuthResult<(User, AuthIdentity)> {
        match self.credentials.find_identity(provider, &profile.sub).await {
            Ok(identity) => {
                let user = self
                    .credentials
                    .find_user_by_id(identity.user_id)
                    .await
                    .map_err(|e| match e {
                        CredentialError::NotFound => AuthError::AccountInactive,
                        other => other.into(),
                    })?;
                return Ok((user, identity));
            }
            Err(CredentialError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let email = normalize_email(&profile.email);
        let user = match self.credentials.find_user_by_email(&email).await {
            Ok(user) if profile.email_verified => {
                tracing::info!(user_id = %user.id, %provider, "Linking provider to existing account");
                user
            }
            Ok(_) => {
                return Err(AuthError::Conflict(
                    "email belongs to an existing account".to_string(),
                ));
            }
            Err(CredentialError::NotFound) => {
                let user = self
                    .credentials
                    .create_user(NewUser {
                        email: email.clone(),
                        password_hash: None,
                        email_verified: profile.email_verified,
                    })
                    .await?;
                tracing::info!(user_id = %user.id, %provider, "Created account from provider profile");
                user
            }
            Err(err) => return Err(err.into()),
        };

        let identity = self
            .credentials
            .link_identity(
                user.id,
                IdentityLink {
                    provider,
                    provider_user_id: profile.sub.clone(),
                    email,
                    email_verified: profile.email_verified,
                },
            )
            .await?;
        Ok((user, identity))
    }

    /// Register a password account and sign it in
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Bad email format or password shorter than 8
    /// * `AuthError::Conflict` - Email already registered
    pub async fn register_with_password(
        &self,
        request: SignupRequest,
        device: DeviceInfo,
    ) -> AuthResult<SessionTokens> {
        request.validate()?;

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = self
            .credentials
            .create_user(NewUser {
                email: normalize_email(&request.email),
                password_hash: Some(password_hash),
                email_verified: false,
            })
            .await
            .map_err(|e| match e {
                CredentialError::Conflict(_) => AuthError::Conflict("email already registered".to_string()),
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "Account registered");
        self.issue_session(&user, device).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// A reused token means the grant has leaked: every session of its owner
    /// is revoked before `Reused` is returned.
    ///
    /// # Errors
    ///
    /// * `AuthError::Invalid` - Unknown token
    /// * `AuthError::Expired` - Session expired
    /// * `AuthError::Reused` - Token already consumed or revoked
    /// * `AuthError::StoreUnavailable` - Reuse detected but the sessions could not be revoked
    /// * `AuthError::AccountInactive` - Owner deactivated or deleted since login
    pub async fn refresh(&self, refresh_token: &str, device: &DeviceInfo) -> AuthResult<SessionTokens> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::Validation("refresh_token is required".to_string()));
        }

        let (session, raw) = match self.sessions.rotate_session(refresh_token).await {
            Ok(rotated) => rotated,
            Err(SessionError::Reused { user_id }) => {
                // A successor minted from the stolen token must not outlive this call
                let revoked = self
                    .sessions
                    .revoke_session(RevokeTarget::User(user_id))
                    .await
                    .map_err(|err| {
                        tracing::error!(%user_id, error = %err, "Failed to revoke sessions after refresh-token reuse");
                        AuthError::from(err)
                    })?;
                tracing::warn!(
                    target: "security",
                    %user_id,
                    revoked,
                    "Refresh token reuse detected, all sessions revoked"
                );
                return Err(AuthError::Reused);
            }
            Err(err) => return Err(err.into()),
        };

        if session.device.user_agent != device.user_agent {
            tracing::debug!(session_id = %session.id, "Refresh from a different user agent");
        }

        let user = match self.credentials.find_user_by_id(session.user_id).await {
            Ok(user) if user.can_sign_in() => user,
            Ok(_) | Err(CredentialError::NotFound) => {
                self.sessions
                    .revoke_session(RevokeTarget::User(session.user_id))
                    .await?;
                return Err(AuthError::AccountInactive);
            }
            Err(err) => return Err(err.into()),
        };

        let access_token = self.codec.issue_access_token(
            user.id,
            &ClaimSet {
                email: Some(user.email.clone()),
                session_id: Some(session.id),
            },
            self.settings.access_ttl,
        )?;

        Ok(self.token_pair(user.id, access_token, raw))
    }

    /// Revoke one session or all of a user's sessions. Idempotent.
    pub async fn logout(&self, target: LogoutTarget) -> AuthResult<u64> {
        let revoked = match target {
            LogoutTarget::RefreshToken(raw) => self.sessions.revoke_by_token(&raw).await?,
            LogoutTarget::User(user_id) => {
                self.sessions
                    .revoke_session(RevokeTarget::User(user_id))
                    .await?
            }
        };
        tracing::debug!(revoked, "Logout");
        Ok(revoked)
    }

    /// Verify an access token's signature, issuer and expiry
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        Ok(self.codec.verify_access_token(token)?)
    }

    /// Verify an access token and check that its session has not been revoked
    pub async fn authenticate(&self, token: &str) -> AuthResult<AccessClaims> {
        let claims = self.verify_access_token(token)?;
        if let Some(session_id) = claims.sid {
            if !self.sessions.is_session_active(session_id).await? {
                return Err(AuthError::Invalid);
            }
        }
        Ok(claims)
    }

    /// Remove a sign-in method from a user
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Provider not linked, or it is the last sign-in method
    pub async fn unlink_identity(&self, user_id: UserId, provider: AuthProvider) -> AuthResult<()> {
        let identities = self.credentials.list_identities(user_id).await?;

        if !identities.iter().any(|i| i.provider == provider) {
            return Err(AuthError::Validation(format!("{provider} is not linked")));
        }
        if identities.len() <= 1 {
            return Err(AuthError::Validation(
                "cannot remove the last sign-in method".to_string(),
            ));
        }

        self.credentials.unlink_identity(user_id, provider).await?;
        tracing::info!(%user_id, %provider, "Identity unlinked");
        Ok(())
    }

    /// Soft-delete the account and revoke every session
    pub async fn delete_account(&self, user_id: UserId) -> AuthResult<()> {
        self.credentials.soft_delete_user(user_id).await.map_err(|e| match e {
            CredentialError::NotFound => AuthError::Invalid,
            other => other.into(),
        })?;
        let revoked = self
            .sessions
            .revoke_session(RevokeTarget::User(user_id))
            .await?;
        tracing::info!(%user_id, revoked, "Account deleted");
        Ok(())
    }

    async fn issue_session(&self, user: &User, device: DeviceInfo) -> AuthResult<SessionTokens> {
        let (session, raw) = self
            .sessions
            .create_session(user.id, device, self.settings.refresh_ttl)
            .await?;

        let access_token = self.codec.issue_access_token(
            user.id,
            &ClaimSet {
                email: Some(user.email.clone()),
                session_id: Some(session.id),
            },
            self.settings.access_ttl,
        )?;

        Ok(self.token_pair(user.id, access_token, raw))
    }

    fn token_pair(&self, user_id: Uuid, access_token: String, refresh_token: String) -> SessionTokens {
        SessionTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.settings.access_ttl.num_seconds(),
            user_id,
        }
    }
}

/// Classify a failed code exchange; a 4xx other than 429 means the code
/// itself was refused
fn code_exchange_error(err: ProviderError) -> AuthError {
    match err {
        ProviderError::Rejected { status, .. } if (400..500).contains(&status) && status != 429 => {
            AuthError::InvalidCredentials
        }
        ProviderError::RedirectMismatch => {
            AuthError::Validation("redirect_uri does not match the registered callback".to_string())
        }
        other => AuthError::Provider(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> ProviderError {
        ProviderError::Rejected {
            status,
            body: "invalid_grant".to_string(),
        }
    }

    #[test]
    fn test_refused_code_is_invalid_credentials() {
        assert!(matches!(code_exchange_error(rejected(400)), AuthError::InvalidCredentials));
        assert!(matches!(code_exchange_error(rejected(401)), AuthError::InvalidCredentials));
    }

    #[test]
    fn test_provider_outages_stay_provider_errors() {
        assert!(matches!(
            code_exchange_error(rejected(429)),
            AuthError::Provider(ProviderError::Rejected { status: 429, .. })
        ));
        assert!(matches!(
            code_exchange_error(rejected(503)),
            AuthError::Provider(ProviderError::Rejected { status: 503, .. })
        ));
        assert!(matches!(
            code_exchange_error(ProviderError::Timeout),
            AuthError::Provider(ProviderError::Timeout)
        ));
    }

    #[test]
    fn test_redirect_mismatch_is_validation() {
        assert!(matches!(
            code_exchange_error(ProviderError::RedirectMismatch),
            AuthError::Validation(_)
        ));
    }
}
