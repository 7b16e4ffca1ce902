//! File index models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored metadata for one indexed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub path: String,
    /// Containing directory relative to the indexed root, `/`-separated.
    /// Empty for files directly under the root.
    pub folder_path: String,
    pub size: u64,
    /// RFC 3339 modification time
    pub modified: String,
    pub user_email: String,
    /// Indexing run that wrote this row
    pub generation: String,
}

impl FileRecord {
    /// Public projection used in tree views
    pub fn to_entry(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            path: self.path.clone(),
            size: self.size,
            modified: self.modified.clone(),
        }
    }
}

/// File as shown inside a folder tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: String,
}

/// Folder tree node for hierarchical display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTreeNode {
    pub files: Vec<FileEntry>,
    pub subfolders: BTreeMap<String, FolderTreeNode>,
}

impl FolderTreeNode {
    /// Number of files in this node and all of its descendants
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .subfolders
                .values()
                .map(FolderTreeNode::file_count)
                .sum::<usize>()
    }

    /// Follow a chain of folder names down from this node
    pub fn descend<'a, I>(&self, segments: I) -> Option<&FolderTreeNode>
    where
        I: IntoIterator<Item = &'a str>,
    {
        segments
            .into_iter()
            .try_fold(self, |node, segment| node.subfolders.get(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: format!("/media/{}", name),
            size: 1,
            modified: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_tree_node_serializes_files_and_subfolders() {
        let mut root = FolderTreeNode::default();
        root.files.push(entry("b.mkv"));
        root.subfolders
            .entry("Shows".to_string())
            .or_default()
            .files
            .push(entry("a.mkv"));

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["files"][0]["name"], "b.mkv");
        assert_eq!(json["subfolders"]["Shows"]["files"][0]["name"], "a.mkv");
        assert!(json["subfolders"]["Shows"]["subfolders"]
            .as_object()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_file_count_and_descend() {
        let mut root = FolderTreeNode::default();
        root.files.push(entry("one"));
        let x = root
            .subfolders
            .entry("Shows".to_string())
            .or_default()
            .subfolders
            .entry("X".to_string())
            .or_default();
        x.files.push(entry("two"));
        x.files.push(entry("three"));

        assert_eq!(root.file_count(), 3);
        assert_eq!(root.descend(["Shows", "X"]).unwrap().files.len(), 2);
        assert!(root.descend(["Movies"]).is_none());
    }

    #[test]
    fn test_entry_projection_drops_owner_fields() {
        let record = FileRecord {
            name: "a.mkv".into(),
            path: "/tv/a.mkv".into(),
            folder_path: String::new(),
            size: 42,
            modified: "2024-01-01T00:00:00+00:00".into(),
            user_email: "me@example.com".into(),
            generation: "g1".into(),
        };
        let json = serde_json::to_value(record.to_entry()).unwrap();
        assert_eq!(json["size"], 42);
        assert!(json.get("user_email").is_none());
        assert!(json.get("generation").is_none());
    }
}
