//! Database migrations for the file index tables

/// Migration SQL for the files table
pub const MIGRATION_SQL: &str = r#"
-- files: one row per indexed file, tagged with the indexing run that wrote it
CREATE TABLE IF NOT EXISTS files (
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    folder_path TEXT NOT NULL DEFAULT '',
    size INTEGER NOT NULL,
    modified TEXT NOT NULL,
    user_email TEXT NOT NULL,
    generation TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_user ON files(user_email);
CREATE INDEX IF NOT EXISTS idx_files_user_generation ON files(user_email, generation);

-- index_runs: newest committed generation per user, only ever moves forward
CREATE TABLE IF NOT EXISTS index_runs (
    user_email TEXT PRIMARY KEY,
    generation TEXT NOT NULL
)
"#;

/// Run the files migration
pub async fn run_migration(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    run_statements(pool, MIGRATION_SQL).await
}

/// Execute each `;`-separated statement of `sql`, tolerating objects that
/// already exist
pub async fn run_statements(pool: &sqlx::SqlitePool, sql: &str) -> Result<(), sqlx::Error> {
    for statement in sql.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            let result = sqlx::query(statement).execute(pool).await;
            if let Err(ref e) = result {
                // Ignore duplicate table/index errors
                let is_duplicate = e.to_string().contains("already exists");
                if !is_duplicate {
                    result?;
                }
            }
        }
    }
    Ok(())
}
