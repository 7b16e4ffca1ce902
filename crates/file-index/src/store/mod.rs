//! Storage backends for file records
//!
//! Every read and write is scoped to one user. Each backend records the newest
//! generation per user and only ever moves it forward. A writer whose
//! generation is behind the recorded one writes nothing. Otherwise the new rows
//! are written first, then strictly older generations are removed. Readers
//! return only rows of the recorded generation, so a replace that fails halfway
//! never exposes a mixed set and a late older run never resurfaces.

mod sqlite;
mod supabase;

pub use sqlite::SqliteFileStore;
pub use supabase::SupabaseFileStore;

use async_trait::async_trait;

use crate::error::IndexResult;
use crate::models::FileRecord;

/// Backend holding the per-user file records
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Swap in `records` as the user's complete set, tagged with `generation`.
    ///
    /// Returns the number of records written, zero when a newer generation is
    /// already recorded for the user.
    async fn replace_user_files(
        &self,
        user_email: &str,
        generation: &str,
        records: &[FileRecord],
    ) -> IndexResult<usize>;

    /// All records of the user's recorded generation, in insertion order
    async fn list_user_files(&self, user_email: &str) -> IndexResult<Vec<FileRecord>>;

    /// Check that the backend is reachable
    async fn ping(&self) -> IndexResult<()>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
