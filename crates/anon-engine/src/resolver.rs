//! Tree resolution
//!
//! Maps a browse path onto the remote tree of a snapshot and picks the file
//! that actually gets rendered for directories.

use std::sync::Arc;

use anon_core::{CommitNode, DirectoryNode, Error, FileNode, Origin, Result, Snapshot, TreeEntry, TreeNode};
use anon_sources::RepositoryProvider;

/// Result of resolving a browse path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Found(Resolution),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Node at the requested path.
    pub node: TreeNode,
    /// File rendered for this request: the node itself for files, the
    /// default file for directories that have one.
    pub effective: Option<FileNode>,
    /// Directory listing shown next to the rendered node.
    pub listing: Vec<TreeEntry>,
    /// The node is a directory but the request path lacked a trailing `/`.
    pub needs_trailing_slash: bool,
}

impl Resolution {
    pub fn is_directory(&self) -> bool {
        matches!(self.node, TreeNode::Directory(_))
    }
}

/// Split a browse path into segments. `None` for paths that try to climb
/// out of the tree or contain empty segments.
pub fn path_segments(path: &str) -> Option<Vec<&str>> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return None;
    }
    Some(segments)
}

/// First file child whose name contains `readme` or `index`, ignoring case.
pub fn default_file(directory: &DirectoryNode) -> Option<&FileNode> {
    directory.children.iter().find_map(|child| match child {
        TreeNode::File(file) => {
            let name = file.name.to_lowercase();
            (name.contains("readme") || name.contains("index")).then_some(file)
        }
        _ => None,
    })
}

/// Follow a chain of single-child directories down to a file.
pub fn collapse_single_child(directory: &DirectoryNode) -> Option<&FileNode> {
    match directory.children.as_slice() {
        [TreeNode::File(file)] => Some(file),
        [TreeNode::Directory(inner)] => effective_file(inner),
        _ => None,
    }
}

/// File rendered for a directory request, if any.
pub fn effective_file(directory: &DirectoryNode) -> Option<&FileNode> {
    default_file(directory).or_else(|| collapse_single_child(directory))
}

/// Resolve `path` in an already fetched tree.
pub fn resolve_in_tree(root: &DirectoryNode, path: &str) -> Resolved {
    let Some(segments) = path_segments(path) else {
        return Resolved::NotFound;
    };

    let mut parent = root;
    let mut current: Option<&TreeNode> = None;
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            match current {
                Some(TreeNode::Directory(dir)) => parent = dir,
                _ => return Resolved::NotFound,
            }
        }
        current = parent.child(segment);
        if current.is_none() {
            return Resolved::NotFound;
        }
    }

    let resolution = match current {
        None => directory_resolution(root, path),
        Some(TreeNode::Directory(dir)) => directory_resolution(dir, path),
        // Files have no trailing separator form.
        Some(TreeNode::File(_)) if path.ends_with('/') => return Resolved::NotFound,
        Some(TreeNode::File(file)) => Resolution {
            node: TreeNode::File(file.clone()),
            effective: Some(file.clone()),
            listing: parent.entries(),
            needs_trailing_slash: false,
        },
        Some(node @ TreeNode::Commit(_)) => Resolution {
            node: node.clone(),
            effective: None,
            listing: parent.entries(),
            needs_trailing_slash: false,
        },
    };
    Resolved::Found(resolution)
}

fn directory_resolution(directory: &DirectoryNode, path: &str) -> Resolution {
    Resolution {
        node: TreeNode::Directory(directory.clone()),
        effective: effective_file(directory).cloned(),
        listing: directory.entries(),
        needs_trailing_slash: !path.is_empty() && !path.ends_with('/'),
    }
}

/// Any provider failure while resolving means the snapshot cannot be read.
fn unavailable(origin: &Origin, err: Error) -> Error {
    tracing::warn!(repository = %origin.full_name(), error = %err, "remote tree unavailable");
    Error::SnapshotUnavailable(err.to_string())
}

/// Resolves browse paths against the live remote tree.
pub struct TreeResolver {
    provider: Arc<dyn RepositoryProvider>,
}

impl TreeResolver {
    pub fn new(provider: Arc<dyn RepositoryProvider>) -> Self {
        Self { provider }
    }

    /// Fails only with [`Error::SnapshotUnavailable`].
    pub async fn resolve(&self, origin: &Origin, snapshot: &Snapshot, path: &str) -> Result<Resolved> {
        if path_segments(path).is_none() {
            return Ok(Resolved::NotFound);
        }
        let tree = self
            .provider
            .get_tree(origin, snapshot)
            .await
            .map_err(|e| unavailable(origin, e))?;
        let resolved = resolve_in_tree(&tree, path);
        tracing::debug!(
            repository = %origin.full_name(),
            path,
            found = matches!(resolved, Resolved::Found(_)),
            "resolved path"
        );
        Ok(resolved)
    }

    /// Commit node for `sha`, carrying its patch.
    pub async fn resolve_commit(&self, origin: &Origin, sha: &str) -> Result<Resolved> {
        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(Resolved::NotFound);
        }
        let patch = match self.provider.get_patch(origin, sha).await {
            Ok(patch) => patch,
            Err(Error::NotFound(_)) => return Ok(Resolved::NotFound),
            Err(e) => return Err(unavailable(origin, e)),
        };
        Ok(Resolved::Found(Resolution {
            node: TreeNode::Commit(CommitNode {
                sha: sha.to_string(),
                patch,
            }),
            effective: None,
            listing: Vec::new(),
            needs_trailing_slash: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anon_core::{EntryKind, FlatEntry};

    fn tree() -> DirectoryNode {
        DirectoryNode::from_entries([
            FlatEntry::file("README.md", 10),
            FlatEntry::file("Cargo.toml", 20),
            FlatEntry::file("src/main.rs", 30),
            FlatEntry::file("src/lib.rs", 40),
            FlatEntry::file("single/only/deep.txt", 5),
            FlatEntry::file("docs/guide.md", 7),
            FlatEntry::file("docs/Index.html", 8),
            FlatEntry::directory("empty"),
        ])
    }

    fn found(resolved: Resolved) -> Resolution {
        match resolved {
            Resolved::Found(resolution) => resolution,
            Resolved::NotFound => panic!("Expected path to resolve"),
        }
    }

    #[test]
    fn test_root_picks_readme() {
        let resolution = found(resolve_in_tree(&tree(), ""));
        assert!(resolution.is_directory());
        assert!(!resolution.needs_trailing_slash);
        assert_eq!(resolution.effective.unwrap().path, "README.md");
        assert_eq!(resolution.listing.len(), 6);
    }

    #[test]
    fn test_default_file_is_case_insensitive_and_first_in_order() {
        let resolution = found(resolve_in_tree(&tree(), "docs/"));
        assert_eq!(resolution.effective.unwrap().name, "Index.html");
    }

    #[test]
    fn test_directory_without_slash_needs_redirect() {
        let resolution = found(resolve_in_tree(&tree(), "src"));
        assert!(resolution.needs_trailing_slash);

        let resolution = found(resolve_in_tree(&tree(), "src/"));
        assert!(!resolution.needs_trailing_slash);
        assert!(resolution.effective.is_none());
        assert_eq!(resolution.listing.len(), 2);
    }

    #[test]
    fn test_file_listing_is_parent_directory() {
        let resolution = found(resolve_in_tree(&tree(), "src/lib.rs"));
        assert_eq!(resolution.effective.unwrap().size, 40);
        let names: Vec<_> = resolution.listing.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["main.rs", "lib.rs"]);

        let resolution = found(resolve_in_tree(&tree(), "Cargo.toml"));
        assert_eq!(resolution.listing.len(), 6);
    }

    #[test]
    fn test_single_child_directories_collapse() {
        let through_dir = found(resolve_in_tree(&tree(), "single/"));
        let direct = found(resolve_in_tree(&tree(), "single/only/deep.txt"));
        assert_eq!(through_dir.effective, direct.effective);
        assert_eq!(through_dir.listing[0].kind, EntryKind::Directory);
    }

    #[test]
    fn test_empty_directory_has_no_effective_file() {
        let resolution = found(resolve_in_tree(&tree(), "empty/"));
        assert!(resolution.effective.is_none());
        assert!(resolution.listing.is_empty());
    }

    #[test]
    fn test_missing_and_unsafe_paths() {
        assert_eq!(resolve_in_tree(&tree(), "nope.txt"), Resolved::NotFound);
        assert_eq!(resolve_in_tree(&tree(), "README.md/x"), Resolved::NotFound);
        assert_eq!(resolve_in_tree(&tree(), "src/../README.md"), Resolved::NotFound);
        assert_eq!(resolve_in_tree(&tree(), "src//lib.rs"), Resolved::NotFound);
    }

    #[test]
    fn test_file_with_trailing_slash_is_not_found() {
        assert_eq!(resolve_in_tree(&tree(), "README.md/"), Resolved::NotFound);
        assert_eq!(resolve_in_tree(&tree(), "src/lib.rs/"), Resolved::NotFound);
        assert!(matches!(resolve_in_tree(&tree(), "src/lib.rs"), Resolved::Found(_)));
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments(""), Some(vec![]));
        assert_eq!(path_segments("/"), Some(vec![]));
        assert_eq!(path_segments("a/b/"), Some(vec!["a", "b"]));
        assert_eq!(path_segments("a/./b"), None);
    }
}
