//! Configuration management for the file index server

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Where file records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sql" => Ok(StoreBackend::Sqlite),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite URL for sessions, and for file records with the sqlite backend
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum database connections (default: 5)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// File record backend (default: sqlite)
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// Supabase project URL, required for the supabase backend
    pub supabase_url: Option<String>,

    /// Supabase API key, required for the supabase backend
    pub supabase_key: Option<String>,

    /// Table holding file records (default: files)
    #[serde(default = "default_supabase_table")]
    pub supabase_table: String,

    /// Google OAuth client id
    pub google_client_id: Option<String>,

    /// Google OAuth client secret
    pub google_client_secret: Option<String>,

    /// Public base URL used to build the OAuth redirect URI
    /// If not set, http://localhost:<port> is used
    pub base_url: Option<String>,

    /// Directory indexed when a request does not name one
    pub default_index_path: Option<String>,

    /// Directory holding index.html and other front-end assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Whether to set Secure flag on cookies (default: false)
    #[serde(default)]
    pub secure_cookies: bool,

    /// CORS allowed origins (comma-separated). If empty, any origin is allowed.
    pub cors_allowed_origins: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "sqlite://./data/file_index.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_supabase_table() -> String {
    "files".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(s) => s.parse().map_err(anyhow::Error::msg)?,
            Err(_) => StoreBackend::default(),
        };
        let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_port);
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_max_connections);
        let supabase_table =
            std::env::var("SUPABASE_TABLE").unwrap_or_else(|_| default_supabase_table());
        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_static_dir());
        let secure_cookies = std::env::var("SECURE_COOKIES")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let config = Self {
            host,
            port,
            database_url,
            max_connections,
            store_backend,
            supabase_url: std::env::var("SUPABASE_URL").ok(),
            supabase_key: std::env::var("SUPABASE_KEY").ok(),
            supabase_table,
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            base_url: std::env::var("BASE_URL").ok(),
            default_index_path: std::env::var("DEFAULT_INDEX_PATH").ok(),
            static_dir,
            secure_cookies,
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS").ok(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.store_backend == StoreBackend::Supabase
            && (self.supabase_url.is_none() || self.supabase_key.is_none())
        {
            anyhow::bail!("STORE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_KEY");
        }
        Ok(())
    }

    /// Base URL the browser reaches this server on, without trailing slash
    pub fn public_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Redirect URI registered with the identity provider
    pub fn oauth_redirect_url(&self) -> String {
        format!("{}/callback", self.public_base_url())
    }

    /// Parsed CORS origins; empty means any origin
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            store_backend: StoreBackend::default(),
            supabase_url: None,
            supabase_key: None,
            supabase_table: default_supabase_table(),
            google_client_id: None,
            google_client_secret: None,
            base_url: None,
            default_index_path: None,
            static_dir: default_static_dir(),
            secure_cookies: false,
            cors_allowed_origins: None,
        }
    }
}
