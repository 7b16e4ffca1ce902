//! SQLite file store

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use super::FileStore;
use crate::error::{IndexError, IndexResult};
use crate::migrations;
use crate::models::FileRecord;

/// Rows per INSERT statement, keeps bind count under SQLite's limit
const INSERT_CHUNK: usize = 100;

type FileRow = (String, String, String, i64, String, String, String);

/// File store backed by a local SQLite database
#[derive(Clone)]
pub struct SqliteFileStore {
    pool: Arc<SqlitePool>,
}

impl SqliteFileStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Private in-memory database with the schema applied
    pub async fn in_memory() -> IndexResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        migrations::run_migration(&pool).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }
}

fn size_to_column(size: u64) -> IndexResult<i64> {
    i64::try_from(size)
        .map_err(|_| IndexError::Internal(format!("file size {} exceeds the size column", size)))
}

fn record_from_row(row: FileRow) -> IndexResult<FileRecord> {
    let size = u64::try_from(row.3).map_err(|_| {
        IndexError::Internal(format!("stored size {} for {} is negative", row.3, row.1))
    })?;
    Ok(FileRecord {
        name: row.0,
        path: row.1,
        folder_path: row.2,
        size,
        modified: row.4,
        user_email: row.5,
        generation: row.6,
    })
}

#[async_trait]
impl FileStore for SqliteFileStore {
    async fn replace_user_files(
        &self,
        user_email: &str,
        generation: &str,
        records: &[FileRecord],
    ) -> IndexResult<usize> {
        let sizes = records
            .iter()
            .map(|record| size_to_column(record.size))
            .collect::<IndexResult<Vec<i64>>>()?;

        let mut tx = self.pool.begin().await?;

        // The recorded generation only moves forward
        sqlx::query(
            r#"
            INSERT INTO index_runs (user_email, generation) VALUES (?, ?)
            ON CONFLICT(user_email) DO UPDATE SET generation = MAX(generation, excluded.generation)
            "#,
        )
        .bind(user_email)
        .bind(generation)
        .execute(&mut *tx)
        .await?;

        let (current,): (String,) =
            sqlx::query_as("SELECT generation FROM index_runs WHERE user_email = ?")
                .bind(user_email)
                .fetch_one(&mut *tx)
                .await?;
        if current != generation {
            tx.rollback().await?;
            info!(
                "Dropping generation {} for {}, newer generation {} is already stored",
                generation, user_email, current
            );
            return Ok(0);
        }

        let rows: Vec<(&FileRecord, i64)> = records.iter().zip(sizes).collect();
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO files (name, path, folder_path, size, modified, user_email, generation) ",
            );
            builder.push_values(chunk, |mut row, (record, size)| {
                row.push_bind(&record.name)
                    .push_bind(&record.path)
                    .push_bind(&record.folder_path)
                    .push_bind(*size)
                    .push_bind(&record.modified)
                    .push_bind(user_email)
                    .push_bind(generation);
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query("DELETE FROM files WHERE user_email = ? AND generation < ?")
            .bind(user_email)
            .bind(generation)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(records.len())
    }

    async fn list_user_files(&self, user_email: &str) -> IndexResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT name, path, folder_path, size, modified, user_email, generation
            FROM files
            WHERE user_email = ?
              AND generation = (SELECT generation FROM index_runs WHERE user_email = ?)
            ORDER BY rowid
            "#,
        )
        .bind(user_email)
        .bind(user_email)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn ping(&self) -> IndexResult<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, folder_path: &str) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: format!("/media/{}/{}", folder_path, name),
            folder_path: folder_path.to_string(),
            size: 1024,
            modified: "2024-05-01T08:30:00+00:00".to_string(),
            user_email: "me@example.com".to_string(),
            generation: String::new(),
        }
    }

    #[tokio::test]
    async fn test_replace_and_list() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        let written = store
            .replace_user_files("me@example.com", "g1", &[record("a", "x"), record("b", "")])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let rows = store.list_user_files("me@example.com").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "a");
        assert_eq!(rows[1].name, "b");
        assert_eq!(rows[0].generation, "g1");
        assert_eq!(rows[0].size, 1024);
    }

    #[tokio::test]
    async fn test_replace_removes_older_generation() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("me@example.com", "g1", &[record("old", "")])
            .await
            .unwrap();
        store
            .replace_user_files("me@example.com", "g2", &[record("new", "")])
            .await
            .unwrap();

        let rows = store.list_user_files("me@example.com").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "new");

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(store.pool().as_ref())
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_late_older_generation_does_not_win() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("me@example.com", "g2", &[record("newer", "")])
            .await
            .unwrap();
        let written = store
            .replace_user_files("me@example.com", "g1", &[record("stale", "")])
            .await
            .unwrap();
        assert_eq!(written, 0);

        let rows = store.list_user_files("me@example.com").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "newer");

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(store.pool().as_ref())
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_late_older_generation_after_empty_newer_run() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("me@example.com", "g1", &[record("first", "")])
            .await
            .unwrap();
        store
            .replace_user_files("me@example.com", "g3", &[])
            .await
            .unwrap();
        store
            .replace_user_files("me@example.com", "g2", &[record("stale", "")])
            .await
            .unwrap();

        assert!(store.list_user_files("me@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_size_is_rejected() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("me@example.com", "g1", &[record("kept", "")])
            .await
            .unwrap();

        let mut huge = record("huge", "");
        huge.size = u64::MAX;
        let err = store
            .replace_user_files("me@example.com", "g2", &[huge])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Internal(_)));

        let rows = store.list_user_files("me@example.com").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "kept");
    }

    #[tokio::test]
    async fn test_negative_stored_size_is_an_error() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("me@example.com", "g1", &[record("a", "")])
            .await
            .unwrap();
        sqlx::query("UPDATE files SET size = -5")
            .execute(store.pool().as_ref())
            .await
            .unwrap();

        let err = store.list_user_files("me@example.com").await.unwrap_err();
        assert!(matches!(err, IndexError::Internal(_)));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("one@example.com", "g1", &[record("a", "")])
            .await
            .unwrap();
        store
            .replace_user_files("two@example.com", "g2", &[record("b", ""), record("c", "")])
            .await
            .unwrap();

        assert_eq!(store.list_user_files("one@example.com").await.unwrap().len(), 1);
        let two = store.list_user_files("two@example.com").await.unwrap();
        assert_eq!(two.len(), 2);
        assert!(two.iter().all(|r| r.user_email == "two@example.com"));
    }

    #[tokio::test]
    async fn test_large_batch_is_chunked() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        let records: Vec<FileRecord> = (0..(INSERT_CHUNK * 2 + 7))
            .map(|i| record(&format!("f{}", i), "bulk"))
            .collect();
        let written = store
            .replace_user_files("me@example.com", "g1", &records)
            .await
            .unwrap();
        assert_eq!(written, records.len());

        let rows = store.list_user_files("me@example.com").await.unwrap();
        assert_eq!(rows.len(), records.len());
        assert_eq!(rows.last().unwrap().name, format!("f{}", records.len() - 1));
    }

    #[tokio::test]
    async fn test_empty_replace_clears_user() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store
            .replace_user_files("me@example.com", "g1", &[record("a", "")])
            .await
            .unwrap();
        store
            .replace_user_files("me@example.com", "g2", &[])
            .await
            .unwrap();
        assert!(store.list_user_files("me@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping() {
        let store = SqliteFileStore::in_memory().await.unwrap();
        store.ping().await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
    }
}
