//! In-memory repository provider
//!
//! Serves fixed repositories from memory and counts every call, so tests can
//! assert what the engine actually fetched.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use anon_core::{DirectoryNode, Error, FlatEntry, Origin, Result, Snapshot};
use async_trait::async_trait;
use dashmap::DashMap;

use crate::provider::RepositoryProvider;

#[derive(Debug, Clone)]
struct MemoryRepository {
    snapshot: Snapshot,
    files: BTreeMap<String, Vec<u8>>,
    patches: HashMap<String, String>,
    unavailable: bool,
}

#[derive(Debug, Default)]
pub struct MemoryProvider {
    repositories: DashMap<String, MemoryRepository>,
    fetched_paths: DashMap<String, usize>,
    commit_calls: AtomicUsize,
    tree_calls: AtomicUsize,
    content_calls: AtomicUsize,
    markdown_calls: AtomicUsize,
}

fn key(origin: &Origin) -> String {
    format!("{}/{}", origin.host, origin.full_name()).to_lowercase()
}

fn blob_id(path: &str) -> String {
    format!("blob:{}", path)
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a repository with the given files at `snapshot`.
    pub fn insert_repository<I, P, B>(&self, origin: &Origin, snapshot: impl Into<Snapshot>, files: I)
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(path, bytes)| (path.into(), bytes.into()))
            .collect();
        self.repositories.insert(
            key(origin),
            MemoryRepository {
                snapshot: snapshot.into(),
                files,
                patches: HashMap::new(),
                unavailable: false,
            },
        );
    }

    pub fn set_file(&self, origin: &Origin, path: &str, bytes: impl Into<Vec<u8>>) {
        if let Some(mut repo) = self.repositories.get_mut(&key(origin)) {
            repo.files.insert(path.to_string(), bytes.into());
        }
    }

    /// Move the branch head, as a push to the origin would.
    pub fn set_snapshot(&self, origin: &Origin, snapshot: impl Into<Snapshot>) {
        if let Some(mut repo) = self.repositories.get_mut(&key(origin)) {
            repo.snapshot = snapshot.into();
        }
    }

    pub fn set_unavailable(&self, origin: &Origin, unavailable: bool) {
        if let Some(mut repo) = self.repositories.get_mut(&key(origin)) {
            repo.unavailable = unavailable;
        }
    }

    pub fn add_patch(&self, origin: &Origin, sha: &str, patch: &str) {
        if let Some(mut repo) = self.repositories.get_mut(&key(origin)) {
            repo.patches.insert(sha.to_string(), patch.to_string());
        }
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn tree_calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    pub fn markdown_calls(&self) -> usize {
        self.markdown_calls.load(Ordering::SeqCst)
    }

    /// How many times the contents of `path` were fetched.
    pub fn fetches_of(&self, path: &str) -> usize {
        self.fetched_paths.get(path).map(|c| *c).unwrap_or(0)
    }

    fn repository(&self, origin: &Origin) -> Result<MemoryRepository> {
        let repo = self
            .repositories
            .get(&key(origin))
            .map(|r| r.clone())
            .ok_or_else(|| Error::SnapshotUnavailable(format!("Unknown repository {}", origin.full_name())))?;
        if repo.unavailable {
            return Err(Error::Provider(format!("{} is unreachable", origin.full_name())));
        }
        Ok(repo)
    }
}

#[async_trait]
impl RepositoryProvider for MemoryProvider {
    async fn get_commit(&self, origin: &Origin) -> Result<Snapshot> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.repository(origin)?.snapshot)
    }

    async fn get_tree(&self, origin: &Origin, _snapshot: &Snapshot) -> Result<DirectoryNode> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        let repo = self.repository(origin)?;
        let entries = repo
            .files
            .iter()
            .map(|(path, bytes)| FlatEntry::file(path.clone(), bytes.len() as u64).with_sha(blob_id(path)));
        Ok(DirectoryNode::from_entries(entries))
    }

    async fn get_file_contents(&self, origin: &Origin, path: &str, _snapshot: &Snapshot) -> Result<Vec<u8>> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        *self.fetched_paths.entry(path.to_string()).or_insert(0) += 1;
        let repo = self.repository(origin)?;
        repo.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn get_blob(&self, origin: &Origin, sha: &str) -> Result<Vec<u8>> {
        let repo = self.repository(origin)?;
        repo.files
            .iter()
            .find(|(path, _)| blob_id(path) == sha)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| Error::NotFound(sha.to_string()))
    }

    async fn get_patch(&self, origin: &Origin, sha: &str) -> Result<String> {
        let repo = self.repository(origin)?;
        repo.patches
            .get(sha)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("commit {}", sha)))
    }

    /// Paragraphs only: enough to tell rendered markdown from its source.
    async fn render_markdown(&self, _origin: &Origin, text: &str) -> Result<String> {
        self.markdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| format!("<p>{}</p>", html_escape::encode_text(p)))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anon_core::TreeNode;

    fn origin() -> Origin {
        Origin::new("alice", "project", "main")
    }

    #[tokio::test]
    async fn test_serves_inserted_repository() {
        let provider = MemoryProvider::new();
        provider.insert_repository(
            &origin(),
            "c1",
            [("README.md", "hello"), ("src/lib.rs", "fn main() {}")],
        );

        let snapshot = provider.get_commit(&origin()).await.unwrap();
        assert_eq!(snapshot.as_str(), "c1");

        let tree = provider.get_tree(&origin(), &snapshot).await.unwrap();
        assert!(matches!(tree.child("README.md"), Some(TreeNode::File(f)) if f.size == 5));
        assert!(tree.child("src").and_then(TreeNode::as_directory).is_some());

        let bytes = provider
            .get_file_contents(&origin(), "src/lib.rs", &snapshot)
            .await
            .unwrap();
        assert_eq!(bytes, b"fn main() {}");
        assert_eq!(provider.fetches_of("src/lib.rs"), 1);
        assert_eq!(provider.fetches_of("README.md"), 0);
    }

    #[tokio::test]
    async fn test_unavailable_and_unknown_repositories() {
        let provider = MemoryProvider::new();
        let err = provider.get_commit(&origin()).await.unwrap_err();
        assert!(err.is_provider_failure());

        provider.insert_repository(&origin(), "c1", [("a.txt", "a")]);
        provider.set_unavailable(&origin(), true);
        let err = provider.get_commit(&origin()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_blob_by_tree_sha() {
        let provider = MemoryProvider::new();
        provider.insert_repository(&origin(), "c1", [("src/lib.rs", "pub fn lib() {}")]);

        let tree = provider.get_tree(&origin(), &Snapshot::new("c1")).await.unwrap();
        let src = tree.child("src").and_then(TreeNode::as_directory).unwrap();
        let Some(TreeNode::File(file)) = src.child("lib.rs") else {
            panic!("Expected lib.rs to be a file");
        };
        let sha = file.sha.clone().unwrap();

        let bytes = provider.get_blob(&origin(), &sha).await.unwrap();
        assert_eq!(bytes, b"pub fn lib() {}");

        let err = provider.get_blob(&origin(), "blob:missing.rs").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_markdown_escapes_paragraphs() {
        let provider = MemoryProvider::new();
        let html = provider
            .render_markdown(&origin(), "# Title\n\n<b>bold</b>")
            .await
            .unwrap();
        assert_eq!(html, "<p># Title</p>\n<p>&lt;b&gt;bold&lt;/b&gt;</p>");
        assert_eq!(provider.markdown_calls(), 1);
    }
}
