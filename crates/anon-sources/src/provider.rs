//! Repository provider trait

use anon_core::{DirectoryNode, Origin, Result, Snapshot};
use async_trait::async_trait;

/// Capability set of a remote source-hosting service.
///
/// The engine never talks to the network itself; everything it knows about a
/// repository comes through this trait. Transport failures are reported as
/// [`anon_core::Error::Provider`], a missing branch or ref as
/// [`anon_core::Error::SnapshotUnavailable`].
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Resolve the origin's branch to its current snapshot.
    async fn get_commit(&self, origin: &Origin) -> Result<Snapshot>;

    /// Full tree of the repository at `snapshot`.
    async fn get_tree(&self, origin: &Origin, snapshot: &Snapshot) -> Result<DirectoryNode>;

    /// Raw bytes of the file at `path` in `snapshot`.
    async fn get_file_contents(&self, origin: &Origin, path: &str, snapshot: &Snapshot) -> Result<Vec<u8>>;

    /// Raw bytes of a blob by its id.
    async fn get_blob(&self, origin: &Origin, sha: &str) -> Result<Vec<u8>>;

    /// Patch text of a commit.
    async fn get_patch(&self, origin: &Origin, sha: &str) -> Result<String>;

    /// Render markdown to HTML in the context of the repository.
    async fn render_markdown(&self, origin: &Origin, text: &str) -> Result<String>;
}
