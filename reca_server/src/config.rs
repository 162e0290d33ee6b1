//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use reca::credentials::AuthProvider;
use reca::db::DatabaseConfig;
use reca::oauth::OAuthProviderConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Token lifetimes
    pub tokens: TokenConfig,
    /// OAuth provider clients
    pub oauth: OAuthConfig,
    /// Prometheus exporter address; exporter disabled when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// `iss` claim written into and required on access tokens
    pub jwt_issuer: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("password_pepper", &"<redacted>")
            .finish()
    }
}

/// Token lifetime configuration
#[derive(Debug, Clone, Copy)]
pub struct TokenConfig {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl TokenConfig {
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_ttl_secs)
    }
}

/// Client registration for one OAuth provider
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Option<String>,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

/// OAuth configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub google: Option<OAuthClientConfig>,
    pub microsoft: Option<OAuthClientConfig>,
    /// Azure AD tenant for the Microsoft endpoints
    pub microsoft_tenant: String,
    /// Per-request timeout for provider calls
    pub http_timeout_secs: u64,
}

impl OAuthConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Provider endpoint configurations for every registered client
    pub fn provider_configs(&self) -> Vec<OAuthProviderConfig> {
        let mut configs = Vec::new();
        if let Some(client) = &self.google {
            let mut config = OAuthProviderConfig::google(&client.client_id, &client.client_secret);
            config.redirect_url = client.redirect_url.clone();
            configs.push(config);
        }
        if let Some(client) = &self.microsoft {
            let mut config = OAuthProviderConfig::microsoft(
                &self.microsoft_tenant,
                &client.client_id,
                &client.client_secret,
            );
            config.redirect_url = client.redirect_url.clone();
            configs.push(config);
        }
        configs
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        // Bind address: CLI, then SERVER_BIND, then PORT on all interfaces
        let bind = match bind_override {
            Some(bind) => bind,
            None => match std::env::var("SERVER_BIND") {
                Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "SERVER_BIND".to_string(),
                    reason: format!("'{raw}' is not a socket address"),
                })?,
                Err(_) => {
                    let port: u16 = parse_env_or("PORT", 8080);
                    SocketAddr::from(([0, 0, 0, 0], port))
                }
            },
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        // Security configuration (REQUIRED)
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let password_pepper =
            std::env::var("PASSWORD_PEPPER").map_err(|_| ConfigError::MissingRequired {
                var: "PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        let security = SecurityConfig {
            jwt_secret,
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "reca".to_string()),
            password_pepper,
        };

        let tokens = TokenConfig {
            access_ttl_secs: parse_env_or("ACCESS_TOKEN_TTL_SECS", 900),
            refresh_ttl_secs: parse_env_or("REFRESH_TOKEN_TTL_SECS", 604_800),
        };

        let oauth = OAuthConfig {
            google: oauth_client_from_env("GOOGLE")?,
            microsoft: oauth_client_from_env("MICROSOFT")?,
            microsoft_tenant: std::env::var("MICROSOFT_TENANT").unwrap_or_else(|_| "common".to_string()),
            http_timeout_secs: parse_env_or("OAUTH_HTTP_TIMEOUT_SECS", 10),
        };

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(raw) if !raw.is_empty() => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("'{raw}' is not a socket address"),
            })?),
            _ => None,
        };

        Ok(ServerConfig {
            bind,
            database,
            security,
            tokens,
            oauth,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        if self.security.jwt_issuer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "JWT_ISSUER".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.tokens.access_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "ACCESS_TOKEN_TTL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.tokens.refresh_ttl_secs <= self.tokens.access_ttl_secs {
            return Err(ConfigError::Invalid {
                var: "REFRESH_TOKEN_TTL_SECS".to_string(),
                reason: format!(
                    "Must be greater than the access token TTL ({})",
                    self.tokens.access_ttl_secs
                ),
            });
        }

        if self.oauth.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "OAUTH_HTTP_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }

    /// Providers with a client registration
    pub fn configured_providers(&self) -> Vec<AuthProvider> {
        self.oauth.provider_configs().iter().map(|c| c.provider).collect()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Read `<PREFIX>_CLIENT_ID`, `<PREFIX>_CLIENT_SECRET` and `<PREFIX>_REDIRECT_URL`.
///
/// A provider is enabled by setting its client ID; the secret is then required.
fn oauth_client_from_env(prefix: &str) -> Result<Option<OAuthClientConfig>, ConfigError> {
    let id_var = format!("{prefix}_CLIENT_ID");
    let Some(client_id) = std::env::var(&id_var).ok().filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let secret_var = format!("{prefix}_CLIENT_SECRET");
    let client_secret = std::env::var(&secret_var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            var: secret_var,
            hint: format!("Required when {id_var} is set"),
        })?;

    Ok(Some(OAuthClientConfig {
        client_id,
        client_secret,
        redirect_url: std::env::var(format!("{prefix}_REDIRECT_URL"))
            .ok()
            .filter(|v| !v.is_empty()),
    }))
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
