//! File index core
//!
//! This crate holds everything the file index server needs that is not HTTP
//! wiring: the record model, the directory walker that produces records, the
//! storage backends that persist them per user, and the tree view built from
//! stored records.
//!
//! # Features
//! - Recursive directory indexing with per-file error isolation
//! - Generation-swap replacement of a user's record set
//! - SQLite and Supabase (PostgREST) storage backends
//! - Folder tree construction with case-insensitive filtering

pub mod error;
pub mod indexer;
pub mod migrations;
pub mod models;
pub mod store;
pub mod tree;

pub use error::{IndexError, IndexResult};
pub use indexer::{reindex, IndexSummary};
pub use models::{FileEntry, FileRecord, FolderTreeNode};
pub use store::{FileStore, SqliteFileStore, SupabaseFileStore};
pub use tree::{build_tree, TreeBuilder};
