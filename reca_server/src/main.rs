//! Authentication server: password and OAuth sign-in, refresh-token rotation
//! and session revocation over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use reca::{
    auth::{AuthEngine, EngineSettings},
    credentials::{PasswordHasher, PgCredentialStore},
    db::Database,
    oauth::{DEFAULT_RETRY_BACKOFF, HttpOAuthProvider, OAuthProviders},
    session::{PgSessionStore, SessionLedger},
    token::TokenCodec,
};
use reca_server::{api, config::ServerConfig, logging, metrics};

const HELP: &str = "\
Run the ACA RECA authentication server

USAGE:
  reca_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND, or 0.0.0.0:$PORT]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or DB_* parts]

FLAGS:
  --skip-migrations        Do not apply pending migrations at startup
  -h, --help               Print help information

ENVIRONMENT:
  JWT_SECRET               Access-token signing secret (>= 32 chars, required)
  PASSWORD_PEPPER          Password hashing pepper (>= 16 chars, required)
  JWT_ISSUER               Access-token issuer [default: reca]
  ACCESS_TOKEN_TTL_SECS    Access-token lifetime [default: 900]
  REFRESH_TOKEN_TTL_SECS   Refresh-token lifetime [default: 604800]
  GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET / GOOGLE_REDIRECT_URL
  MICROSOFT_CLIENT_ID / MICROSOFT_CLIENT_SECRET / MICROSOFT_REDIRECT_URL / MICROSOFT_TENANT
  OAUTH_HTTP_TIMEOUT_SECS  Provider request timeout [default: 10]
  METRICS_BIND             Prometheus exporter address [default: disabled]
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        skip_migrations: pargs.contains("--skip-migrations"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    tracing::info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;

    if args.skip_migrations {
        tracing::warn!("Skipping database migrations");
    } else {
        db.migrate().await.context("Failed to run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let mut providers = OAuthProviders::new();
    for provider_config in config.oauth.provider_configs() {
        let provider = provider_config.provider;
        let client = HttpOAuthProvider::new(provider_config, config.oauth.http_timeout())
            .with_context(|| format!("Failed to build {provider} OAuth client"))?;
        providers.register(Arc::new(client));
        tracing::info!(%provider, "OAuth provider configured");
    }

    let settings = EngineSettings {
        access_ttl: config.tokens.access_ttl(),
        refresh_ttl: config.tokens.refresh_ttl(),
        retry_backoff: DEFAULT_RETRY_BACKOFF,
    };

    let engine = AuthEngine::new(
        Arc::new(PgCredentialStore::new(db.pool().clone())),
        PasswordHasher::new(config.security.password_pepper.clone()),
        Arc::new(TokenCodec::new(
            config.security.jwt_secret.as_bytes(),
            config.security.jwt_issuer.clone(),
        )),
        SessionLedger::new(
            Arc::new(PgSessionStore::new(db.pool().clone())),
            settings.refresh_ttl,
        ),
        providers,
        settings,
    );

    let app = api::create_router(api::AppState {
        engine: Arc::new(engine),
        db: Some(db.clone()),
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(bind = %config.bind, "Server is running. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Resolves on SIGINT or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
