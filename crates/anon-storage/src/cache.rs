//! Snapshot cache of rendered pages
//!
//! Entries are keyed by repository id, snapshot and [`CacheKey`]. A request
//! only ever reads entries of the snapshot it resolved, so a render that
//! finishes after the snapshot moved lands in a namespace nobody reads. The
//! engine still calls [`SnapshotCache::invalidate_all`] when the snapshot
//! moves, to drop the old pages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anon_core::{MimeType, RenderedPage, Snapshot};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Result, StorageError, atomic_write, validate_key};

/// What a cached page was rendered for. Directory, file and commit pages live
/// in separate namespaces, so a directory page never shadows a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Directory page, by directory path. Empty for the root.
    Directory(String),
    File(String),
    Commit(String),
}

impl CacheKey {
    fn area(&self) -> &'static str {
        match self {
            CacheKey::Directory(_) => "dirs",
            CacheKey::File(_) => "files",
            CacheKey::Commit(_) => "commits",
        }
    }

    /// Path of the entry inside its area.
    fn relative(&self) -> String {
        match self {
            CacheKey::Directory(dir) if dir.is_empty() => "index.html".to_string(),
            CacheKey::Directory(dir) => format!("{}/index.html", dir),
            CacheKey::File(path) | CacheKey::Commit(path) => path.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.area(), self.relative())
    }
}

/// Sidecar stored next to every cached page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub content_type: MimeType,
    pub size: u64,
    /// BLAKE3 hex digest of the bytes. Served as the page's ETag.
    pub digest: String,
    /// Whole seconds, the precision of the sidecar.
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl CacheMetadata {
    pub fn for_page(page: &RenderedPage) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            content_type: page.content_type,
            size: page.bytes.len() as u64,
            digest: blake3::hash(&page.bytes).to_hex().to_string(),
            created_at: now.replace_nanosecond(0).unwrap_or(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub page: RenderedPage,
    pub metadata: CacheMetadata,
}

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, repository_id: &str, snapshot: &Snapshot, key: &CacheKey) -> Result<Option<CacheEntry>>;

    async fn put(
        &self,
        repository_id: &str,
        snapshot: &Snapshot,
        key: &CacheKey,
        page: &RenderedPage,
    ) -> Result<CacheMetadata>;

    /// Drop every entry of a repository, whatever its snapshot.
    async fn invalidate_all(&self, repository_id: &str) -> Result<()>;
}

/// Rejects ids and snapshots that are not a single path segment.
fn validate_segment(segment: &str) -> Result<()> {
    if segment.contains('/') {
        return Err(StorageError::InvalidKey(segment.to_string()));
    }
    validate_key(segment)
}

/// Validates the key as seen by the storage layer.
fn validate_cache_key(key: &CacheKey) -> Result<()> {
    match key {
        CacheKey::Commit(sha) => validate_segment(sha),
        other => validate_key(&other.relative()),
    }
}

/// File-system cache.
///
/// Layout:
/// ```text
/// <root>/<id>/<snapshot>/content/<area>/<key>     page bytes
/// <root>/<id>/<snapshot>/meta/<area>/<key>.json   CacheMetadata
/// ```
/// `<area>` is `dirs`, `files` or `commits`. Content is written before
/// metadata, so an entry only exists once its metadata file does.
pub struct FsSnapshotCache {
    root: PathBuf,
}

impl FsSnapshotCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository_dir(&self, repository_id: &str) -> Result<PathBuf> {
        validate_segment(repository_id)?;
        Ok(self.root.join(repository_id))
    }

    fn paths(&self, repository_id: &str, snapshot: &Snapshot, key: &CacheKey) -> Result<(PathBuf, PathBuf)> {
        validate_cache_key(key)?;
        validate_segment(snapshot.as_str())?;
        let dir = self.repository_dir(repository_id)?.join(snapshot.as_str());
        let relative = key.relative();
        let content = dir.join("content").join(key.area()).join(&relative);
        let meta = dir.join("meta").join(key.area()).join(format!("{}.json", relative));
        Ok((content, meta))
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl SnapshotCache for FsSnapshotCache {
    async fn get(&self, repository_id: &str, snapshot: &Snapshot, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let (content_path, meta_path) = self.paths(repository_id, snapshot, key)?;

        let Some(meta_bytes) = read_optional(&meta_path).await? else {
            return Ok(None);
        };
        let metadata: CacheMetadata = serde_json::from_slice(&meta_bytes)?;

        let Some(bytes) = read_optional(&content_path).await? else {
            tracing::warn!(repository_id, key = %key, "cache metadata without content, ignoring entry");
            return Ok(None);
        };
        if bytes.len() as u64 != metadata.size {
            tracing::warn!(
                repository_id,
                key = %key,
                expected = metadata.size,
                actual = bytes.len(),
                "cached content size mismatch, ignoring entry"
            );
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            page: RenderedPage::new(bytes, metadata.content_type),
            metadata,
        }))
    }

    async fn put(
        &self,
        repository_id: &str,
        snapshot: &Snapshot,
        key: &CacheKey,
        page: &RenderedPage,
    ) -> Result<CacheMetadata> {
        let (content_path, meta_path) = self.paths(repository_id, snapshot, key)?;
        let metadata = CacheMetadata::for_page(page);

        atomic_write(&content_path, &page.bytes).await?;
        atomic_write(&meta_path, &serde_json::to_vec_pretty(&metadata)?).await?;

        tracing::debug!(repository_id, snapshot = %snapshot, key = %key, size = metadata.size, "cached page");
        Ok(metadata)
    }

    async fn invalidate_all(&self, repository_id: &str) -> Result<()> {
        let dir = self.repository_dir(repository_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(repository_id, "invalidated snapshot cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

type MemoryKey = (String, Snapshot, CacheKey);

/// In-memory cache with hit and write counters.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    entries: DashMap<MemoryKey, CacheEntry>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    puts: AtomicUsize,
    invalidations: AtomicUsize,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, repository_id: &str, snapshot: &Snapshot, key: &CacheKey) -> bool {
        self.entries
            .contains_key(&(repository_id.to_string(), snapshot.clone(), key.clone()))
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn get(&self, repository_id: &str, snapshot: &Snapshot, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let entry = self
            .entries
            .get(&(repository_id.to_string(), snapshot.clone(), key.clone()))
            .map(|e| e.clone());
        match entry {
            Some(_) => self.hits.fetch_add(1, Ordering::SeqCst),
            None => self.misses.fetch_add(1, Ordering::SeqCst),
        };
        Ok(entry)
    }

    async fn put(
        &self,
        repository_id: &str,
        snapshot: &Snapshot,
        key: &CacheKey,
        page: &RenderedPage,
    ) -> Result<CacheMetadata> {
        validate_cache_key(key)?;
        let metadata = CacheMetadata::for_page(page);
        self.entries.insert(
            (repository_id.to_string(), snapshot.clone(), key.clone()),
            CacheEntry {
                page: page.clone(),
                metadata: metadata.clone(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(metadata)
    }

    async fn invalidate_all(&self, repository_id: &str) -> Result<()> {
        self.entries.retain(|(id, _, _), _| id != repository_id);
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
