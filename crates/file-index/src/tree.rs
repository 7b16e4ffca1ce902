//! Folder tree construction from flat file records

use crate::models::{FileRecord, FolderTreeNode};

/// Separator used in stored `folder_path` values
pub const FOLDER_SEPARATOR: &str = "/";

/// Incrementally builds a [`FolderTreeNode`] from records
#[derive(Debug, Default)]
pub struct TreeBuilder {
    root: FolderTreeNode,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a record under the folder named by its `folder_path`
    pub fn insert(&mut self, record: &FileRecord) {
        let mut node = &mut self.root;
        for segment in folder_segments(&record.folder_path) {
            node = node.subfolders.entry(segment.to_string()).or_default();
        }
        node.files.push(record.to_entry());
    }

    pub fn finish(self) -> FolderTreeNode {
        self.root
    }
}

/// Split a stored folder path into its non-empty segments
pub fn folder_segments(folder_path: &str) -> impl Iterator<Item = &str> {
    folder_path
        .split(FOLDER_SEPARATOR)
        .filter(|segment| !segment.is_empty())
}

/// Case-insensitive substring match on name or folder path
pub fn matches_query(record: &FileRecord, needle_lower: &str) -> bool {
    record.name.to_lowercase().contains(needle_lower)
        || record.folder_path.to_lowercase().contains(needle_lower)
}

/// Build a folder tree, keeping only records that match `query` when one is given.
///
/// Files keep the order in which `records` yields them.
pub fn build_tree<'a, I>(records: I, query: Option<&str>) -> FolderTreeNode
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let needle = query
        .map(str::to_lowercase)
        .filter(|q| !q.is_empty());

    let mut builder = TreeBuilder::new();
    for record in records {
        if let Some(ref needle) = needle {
            if !matches_query(record, needle) {
                continue;
            }
        }
        builder.insert(record);
    }
    builder.finish()
}
