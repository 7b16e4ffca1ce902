//! Application state

use file_index::FileStore;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::oauth::IdentityProvider;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Local database for sessions and pending logins
    pub pool: Arc<SqlitePool>,

    /// Backend holding file records
    pub store: Arc<dyn FileStore>,

    /// External login provider
    pub identity: Arc<dyn IdentityProvider>,

    /// Server configuration
    pub config: Config,
}
