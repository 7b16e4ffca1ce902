//! Database migrations for authentication tables

/// Migration SQL for auth tables
pub const MIGRATION_SQL: &str = r#"
-- sessions: Web session management
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_email TEXT NOT NULL,
    display_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

-- oauth_states: logins started at /login and not yet completed
CREATE TABLE IF NOT EXISTS oauth_states (
    csrf_state TEXT PRIMARY KEY,
    pkce_verifier TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_oauth_states_created ON oauth_states(created_at)
"#;

/// Run auth migration
pub async fn run_migration(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    file_index::migrations::run_statements(pool, MIGRATION_SQL).await
}
