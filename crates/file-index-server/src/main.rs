//! File Index Server
//!
//! Indexes a local directory tree on request and lets a signed-in user browse
//! and search the stored file metadata as a folder tree. Users sign in with
//! Google; every stored record belongs to exactly one user.

mod auth;
mod config;
mod routes;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use file_index::{FileStore, SqliteFileStore, SupabaseFileStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::oauth::GoogleProvider;
use crate::auth::session::{PendingLoginStore, SessionService};
use crate::config::{Config, StoreBackend};
use crate::state::AppState;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Parser)]
#[command(version, about = "Personal file index web server")]
struct Cli {
    /// TOML config file; environment variables are used when absent
    #[arg(long, env = "FILE_INDEX_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "file_index_server=info,file_index=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    info!("Starting File Index Server on {}:{}", config.host, config.port);

    // Ensure parent directory exists for SQLite
    let database_url = config.database_url.clone();
    if database_url.starts_with("sqlite:") {
        let path = database_url.trim_start_matches("sqlite:");
        let path = path.trim_start_matches("//");
        // Remove query string for path extraction
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    info!("Connecting to database: {}", database_url);
    let pool = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&database_url)
            .await?,
    );

    info!("Running database migrations...");
    auth::migrations::run_migration(&pool).await?;

    let store: Arc<dyn FileStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            file_index::migrations::run_migration(&pool).await?;
            Arc::new(SqliteFileStore::new(pool.clone()))
        }
        StoreBackend::Supabase => {
            let url = config
                .supabase_url
                .as_deref()
                .context("SUPABASE_URL is required")?;
            let key = config
                .supabase_key
                .as_deref()
                .context("SUPABASE_KEY is required")?;
            Arc::new(SupabaseFileStore::new(url, key, &config.supabase_table))
        }
    };
    info!("Database migrations completed, file store: {}", store.backend_name());

    let client_id = config
        .google_client_id
        .as_deref()
        .context("GOOGLE_CLIENT_ID is required")?;
    let client_secret = config
        .google_client_secret
        .as_deref()
        .context("GOOGLE_CLIENT_SECRET is required")?;
    let identity = GoogleProvider::new(client_id, client_secret, &config.oauth_redirect_url())?;

    let state = Arc::new(AppState {
        pool: pool.clone(),
        store,
        identity: Arc::new(identity),
        config: config.clone(),
    });

    spawn_cleanup(pool);

    let app = routes::build_router(state);

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired sessions and abandoned logins
fn spawn_cleanup(pool: Arc<sqlx::SqlitePool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match SessionService::new(pool.clone()).cleanup_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Removed {} expired sessions", n),
                Err(e) => error!("Session cleanup failed: {}", e),
            }
            if let Err(e) = PendingLoginStore::new(pool.clone()).cleanup_expired().await {
                error!("Login state cleanup failed: {}", e);
            }
        }
    });
}
