//! Lockbox API server binary.
//!
//! Runs on Postgres with a file-backed key custody, or entirely in memory
//! with `--ephemeral`.

use std::sync::Arc;

use clap::Parser;
use lockbox_api::AppState;
use lockbox_api::config::ApiConfig;
use lockbox_core::auth::identity::MemoryIdentityRepository;
use lockbox_core::auth::queries::{PgIdentityRepository, PgRefreshTokenStore};
use lockbox_core::auth::refresh::MemoryRefreshTokenStore;
use lockbox_core::auth::session::{SessionService, SessionStores};
use lockbox_core::keystore::file::FileKeyCustody;
use lockbox_core::keystore::memory::MemoryKeyCustody;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "lockbox_server", about = "Lockbox credential and session API")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3200")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "LOCKBOX_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Keep every store in memory. Nothing survives a restart.
    #[arg(long, default_value_t = false)]
    ephemeral: bool,
}

async fn session_stores(
    config: &ApiConfig,
    ephemeral: bool,
) -> Result<SessionStores, Box<dyn std::error::Error>> {
    let database_url = match (&config.database_url, ephemeral) {
        (Some(url), false) => url,
        (None, false) => return Err("DATABASE_URL is required unless --ephemeral is set".into()),
        (_, true) => {
            warn!("ephemeral mode: identities, sessions and envelope keys are kept in memory");
            return Ok(SessionStores {
                identities: Arc::new(MemoryIdentityRepository::new()),
                refresh_tokens: Arc::new(MemoryRefreshTokenStore::new()),
                key_custody: Arc::new(MemoryKeyCustody::new()),
            });
        }
    };

    info!(max_connections = config.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(database_url)
        .await?;

    info!("running database migrations");
    lockbox_core::migrate::migrate(&pool).await?;

    let custody = FileKeyCustody::open(&config.auth.key_file).await?;

    Ok(SessionStores {
        identities: Arc::new(PgIdentityRepository::new(pool.clone())),
        refresh_tokens: Arc::new(PgRefreshTokenStore::new(pool)),
        key_custody: Arc::new(custody),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,lockbox_api=debug,lockbox_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    config.bind_addr = args.bind;
    config.max_connections = args.max_connections;
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }
    info!(
        bind_addr = %config.bind_addr,
        ephemeral = args.ephemeral,
        issuer = %config.auth.issuer,
        "starting lockbox_server"
    );

    let stores = session_stores(&config, args.ephemeral).await?;
    let sessions = SessionService::new(&config.auth, stores);

    let purged = sessions.refresh_tokens().purge_expired().await?;
    if purged > 0 {
        info!(purged, "removed expired refresh tokens");
    }

    let app = lockbox_api::router(AppState::new(sessions));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}
