//! Session management service

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// How long a login session stays valid
pub const SESSION_TTL_DAYS: i64 = 7;

/// How long a started login may take to come back through /callback
pub const LOGIN_STATE_TTL_MINUTES: i64 = 10;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Session entity
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Session service for web authentication
pub struct SessionService {
    pool: Arc<SqlitePool>,
}

impl SessionService {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a new session for a user who just signed in
    pub async fn create_session(&self, user_email: &str, display_name: &str) -> Result<Session> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_TTL_DAYS);

        sqlx::query(
            "INSERT INTO sessions (id, user_email, display_name, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session_id)
        .bind(user_email)
        .bind(display_name)
        .bind(timestamp(now))
        .bind(timestamp(expires_at))
        .execute(self.pool.as_ref())
        .await?;

        Ok(Session {
            id: session_id,
            user_email: user_email.to_string(),
            display_name: display_name.to_string(),
            created_at: now,
            expires_at,
        })
    }

    /// Look up a live session. Expired sessions are removed and reported as absent.
    pub async fn validate_session(&self, session_id: &str) -> Result<Option<Session>> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT user_email, display_name, created_at, expires_at FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some((user_email, display_name, created_at, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)?.with_timezone(&Utc);
        if Utc::now() > expires_at {
            self.delete_session(session_id).await?;
            return Ok(None);
        }

        Ok(Some(Session {
            id: session_id.to_string(),
            user_email,
            display_name,
            created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
            expires_at,
        }))
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    /// Clean up expired sessions
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(timestamp(Utc::now()))
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}

/// Logins started at /login, keyed by their CSRF state
pub struct PendingLoginStore {
    pool: Arc<SqlitePool>,
}

impl PendingLoginStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Remember the PKCE verifier for a login that is being sent to the provider
    pub async fn save(&self, csrf_state: &str, pkce_verifier: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO oauth_states (csrf_state, pkce_verifier, created_at) VALUES (?, ?, ?)",
        )
        .bind(csrf_state)
        .bind(pkce_verifier)
        .bind(timestamp(Utc::now()))
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Consume a pending login. Each state can be taken once, and only while fresh.
    pub async fn take(&self, csrf_state: &str) -> Result<Option<String>> {
        let row: Option<(String, String)> = sqlx::query_as(
            "DELETE FROM oauth_states WHERE csrf_state = ? RETURNING pkce_verifier, created_at",
        )
        .bind(csrf_state)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some((verifier, created_at)) = row else {
            return Ok(None);
        };
        let created_at = DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc);
        if Utc::now() - created_at > Duration::minutes(LOGIN_STATE_TTL_MINUTES) {
            return Ok(None);
        }
        Ok(Some(verifier))
    }

    /// Drop logins that were never completed
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::minutes(LOGIN_STATE_TTL_MINUTES);
        let result = sqlx::query("DELETE FROM oauth_states WHERE created_at < ?")
            .bind(timestamp(cutoff))
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::auth::migrations::run_migration(&pool).await.unwrap();
        Arc::new(pool)
    }

    #[tokio::test]
    async fn test_session_round_trip_and_logout() {
        let pool = test_pool().await;
        let service = SessionService::new(pool);

        let session = service
            .create_session("me@example.com", "Me")
            .await
            .unwrap();
        let found = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user_email, "me@example.com");
        assert_eq!(found.display_name, "Me");

        service.delete_session(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_is_absent() {
        let service = SessionService::new(test_pool().await);
        assert!(service.validate_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let pool = test_pool().await;
        let past = Utc::now() - Duration::days(1);
        sqlx::query(
            "INSERT INTO sessions (id, user_email, display_name, created_at, expires_at) VALUES ('old', 'me@example.com', 'Me', ?, ?)",
        )
        .bind(timestamp(past - Duration::days(7)))
        .bind(timestamp(past))
        .execute(pool.as_ref())
        .await
        .unwrap();

        let service = SessionService::new(pool.clone());
        assert!(service.validate_session("old").await.unwrap().is_none());

        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool.as_ref())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_sessions() {
        let pool = test_pool().await;
        let service = SessionService::new(pool.clone());
        let live = service.create_session("me@example.com", "Me").await.unwrap();
        sqlx::query(
            "INSERT INTO sessions (id, user_email, display_name, created_at, expires_at) VALUES ('old', 'x@example.com', 'X', ?, ?)",
        )
        .bind(timestamp(Utc::now() - Duration::days(9)))
        .bind(timestamp(Utc::now() - Duration::days(2)))
        .execute(pool.as_ref())
        .await
        .unwrap();

        assert_eq!(service.cleanup_expired().await.unwrap(), 1);
        assert!(service.validate_session(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pending_login_is_single_use() {
        let store = PendingLoginStore::new(test_pool().await);
        store.save("state-1", "verifier-1").await.unwrap();

        assert_eq!(
            store.take("state-1").await.unwrap().as_deref(),
            Some("verifier-1")
        );
        assert!(store.take("state-1").await.unwrap().is_none());
        assert!(store.take("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_pending_login_is_rejected() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO oauth_states (csrf_state, pkce_verifier, created_at) VALUES ('stale', 'v', ?)",
        )
        .bind(timestamp(Utc::now() - Duration::minutes(LOGIN_STATE_TTL_MINUTES + 5)))
        .execute(pool.as_ref())
        .await
        .unwrap();

        let store = PendingLoginStore::new(pool.clone());
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.take("stale").await.unwrap().is_none());
    }
}
