//! Remote tree model
//!
//! Nodes are produced fresh for every request and never cached as
//! structures; only their rendered output is.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub path: String,
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub path: String,
    pub name: String,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNode {
    pub sha: String,
    pub patch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    File(FileNode),
    Directory(DirectoryNode),
    Commit(CommitNode),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File(f) => &f.name,
            TreeNode::Directory(d) => &d.name,
            TreeNode::Commit(c) => &c.sha,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::File(f) => &f.path,
            TreeNode::Directory(d) => &d.path,
            TreeNode::Commit(c) => &c.sha,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            TreeNode::Directory(d) => Some(d),
            _ => None,
        }
    }

    /// Summary used by listings.
    pub fn entry(&self) -> TreeEntry {
        match self {
            TreeNode::File(f) => TreeEntry {
                name: f.name.clone(),
                path: f.path.clone(),
                kind: EntryKind::File,
                size: Some(f.size),
            },
            TreeNode::Directory(d) => TreeEntry {
                name: d.name.clone(),
                path: d.path.clone(),
                kind: EntryKind::Directory,
                size: None,
            },
            TreeNode::Commit(c) => TreeEntry {
                name: c.sha.clone(),
                path: c.sha.clone(),
                kind: EntryKind::Commit,
                size: None,
            },
        }
    }
}

impl DirectoryNode {
    pub fn root() -> Self {
        Self {
            path: String::new(),
            name: String::new(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    pub fn entries(&self) -> Vec<TreeEntry> {
        self.children.iter().map(TreeNode::entry).collect()
    }

    /// Build a nested tree from flat `path` entries, the shape source-hosting
    /// APIs return. Child order follows input order; intermediate
    /// directories missing from the input are created on the fly.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = FlatEntry>,
    {
        let mut children: HashMap<String, Vec<FlatEntry>> = HashMap::new();
        let mut known_dirs: HashSet<String> = HashSet::new();
        known_dirs.insert(String::new());

        for entry in entries {
            let path = entry.path.trim_matches('/').to_string();
            if path.is_empty() {
                continue;
            }
            register_parents(&path, &mut children, &mut known_dirs);
            if entry.kind == EntryKind::Directory && !known_dirs.insert(path.clone()) {
                continue;
            }
            let parent = parent_of(&path).to_string();
            children.entry(parent).or_default().push(FlatEntry { path, ..entry });
        }

        build_directory(String::new(), String::new(), &mut children)
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

fn register_parents(
    path: &str,
    children: &mut HashMap<String, Vec<FlatEntry>>,
    known_dirs: &mut HashSet<String>,
) {
    let parent = parent_of(path);
    if known_dirs.contains(parent) {
        return;
    }
    register_parents(parent, children, known_dirs);
    known_dirs.insert(parent.to_string());
    children
        .entry(parent_of(parent).to_string())
        .or_default()
        .push(FlatEntry::directory(parent));
}

fn build_directory(
    path: String,
    name: String,
    children: &mut HashMap<String, Vec<FlatEntry>>,
) -> DirectoryNode {
    let entries = children.remove(&path).unwrap_or_default();
    let nodes = entries
        .into_iter()
        .map(|entry| match entry.kind {
            EntryKind::Directory => {
                let name = name_of(&entry.path).to_string();
                TreeNode::Directory(build_directory(entry.path, name, children))
            }
            _ => TreeNode::File(FileNode {
                name: name_of(&entry.path).to_string(),
                size: entry.size.unwrap_or(0),
                sha: entry.sha,
                binary: None,
                path: entry.path,
            }),
        })
        .collect();

    DirectoryNode {
        path,
        name,
        children: nodes,
    }
}

/// One row of a flat tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub path: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub sha: Option<String>,
}

impl FlatEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
            sha: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            size: None,
            sha: None,
        }
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
    Commit,
}

/// Listing row: the part of a node a directory view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entries_nests_and_keeps_order() {
        let tree = DirectoryNode::from_entries(vec![
            FlatEntry::file("README.md", 10),
            FlatEntry::directory("src"),
            FlatEntry::file("src/main.rs", 20),
            FlatEntry::file("src/lib.rs", 30),
        ]);

        let names: Vec<_> = tree.children.iter().map(TreeNode::name).collect();
        assert_eq!(names, vec!["README.md", "src"]);

        let src = tree.child("src").and_then(TreeNode::as_directory).unwrap();
        assert_eq!(src.path, "src");
        let names: Vec<_> = src.children.iter().map(TreeNode::name).collect();
        assert_eq!(names, vec!["main.rs", "lib.rs"]);
        assert_eq!(src.children[1].path(), "src/lib.rs");
    }

    #[test]
    fn test_from_entries_creates_missing_parents() {
        let tree = DirectoryNode::from_entries(vec![FlatEntry::file("a/b/c.txt", 3)]);

        let a = tree.child("a").and_then(TreeNode::as_directory).unwrap();
        let b = a.child("b").and_then(TreeNode::as_directory).unwrap();
        assert_eq!(b.path, "a/b");
        assert_eq!(b.children.len(), 1);
    }

    #[test]
    fn test_directory_listed_once() {
        let tree = DirectoryNode::from_entries(vec![
            FlatEntry::file("docs/index.html", 1),
            FlatEntry::directory("docs"),
        ]);
        assert_eq!(tree.children.len(), 1);
    }

    #[test]
    fn test_entry_summary() {
        let tree = DirectoryNode::from_entries(vec![
            FlatEntry::file("a.txt", 5),
            FlatEntry::directory("lib"),
        ]);
        let entries = tree.entries();
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, Some(5));
        assert_eq!(entries[1].kind, EntryKind::Directory);
        assert_eq!(entries[1].size, None);
    }
}
