//! Directory indexing
//!
//! Walks a directory tree, turns every file into a [`FileRecord`] and swaps the
//! result in as the user's record set.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use crate::error::{IndexError, IndexResult};
use crate::models::FileRecord;
use crate::store::FileStore;
use crate::tree::FOLDER_SEPARATOR;

/// Outcome of one indexing run
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    /// Records written to the store
    pub count: usize,
    /// Entries that could not be read and were left out
    pub skipped: usize,
    pub generation: String,
}

/// Records collected from a directory walk
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    pub skipped: usize,
}

/// New time-ordered generation id for an indexing run
pub fn new_generation() -> String {
    Uuid::now_v7().to_string()
}

/// Walk `root` and collect a record for every file below it.
///
/// Symlinks are not followed into directories. A file whose metadata cannot be
/// read is logged and skipped.
pub fn scan_directory(root: &Path, user_email: &str, generation: &str) -> IndexResult<ScanOutcome> {
    let root = std::path::absolute(root)?;
    if !root.is_dir() {
        return Err(IndexError::InvalidRoot(root.display().to_string()));
    }

    let mut outcome = ScanOutcome::default();
    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error walking {}: {}", root.display(), e);
                outcome.skipped += 1;
                continue;
            }
        };
        if !is_file_entry(&entry) {
            continue;
        }

        match file_record(&root, &entry, user_email, generation) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!("Error processing file {}: {}", entry.path().display(), e);
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

/// Anything that is not a directory, after resolving symlinks
fn is_file_entry(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return false;
    }
    if file_type.is_symlink() {
        return !entry.path().is_dir();
    }
    true
}

fn file_record(
    root: &Path,
    entry: &DirEntry,
    user_email: &str,
    generation: &str,
) -> std::io::Result<FileRecord> {
    let path = entry.path();
    let metadata = std::fs::metadata(path)?;
    let modified = DateTime::<Utc>::from(metadata.modified()?).to_rfc3339();

    Ok(FileRecord {
        name: entry.file_name().to_string_lossy().to_string(),
        path: path.to_string_lossy().to_string(),
        folder_path: relative_folder(root, path),
        size: metadata.len(),
        modified,
        user_email: user_email.to_string(),
        generation: generation.to_string(),
    })
}

/// Parent directory of `path` relative to `root`, joined with `/`
pub fn relative_folder(root: &Path, path: &Path) -> String {
    let parent = path.parent().unwrap_or(root);
    let relative = parent.strip_prefix(root).unwrap_or(parent);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(FOLDER_SEPARATOR)
}

/// Index `root` for `user_email` and replace that user's stored records.
///
/// The walk runs on the blocking pool; the store swap only happens once the
/// whole walk has finished.
pub async fn reindex(
    store: &dyn FileStore,
    root: impl Into<PathBuf>,
    user_email: &str,
) -> IndexResult<IndexSummary> {
    let root = root.into();
    let generation = new_generation();
    info!("Indexing {} for {}", root.display(), user_email);

    let outcome = {
        let root = root.clone();
        let user_email = user_email.to_string();
        let generation = generation.clone();
        tokio::task::spawn_blocking(move || scan_directory(&root, &user_email, &generation))
            .await??
    };

    let written = store
        .replace_user_files(user_email, &generation, &outcome.records)
        .await?;

    info!(
        "Indexed {} files under {} ({} skipped)",
        written,
        root.display(),
        outcome.skipped
    );

    Ok(IndexSummary {
        count: written,
        skipped: outcome.skipped,
        generation,
    })
}
