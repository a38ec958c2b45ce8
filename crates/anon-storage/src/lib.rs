//! Storage layer for anon
//!
//! This crate provides:
//! - The snapshot cache of rendered pages, on disk or in memory
//! - Registration persistence

pub mod cache;
pub mod error;
pub mod registrations;

pub use cache::{CacheEntry, CacheKey, CacheMetadata, FsSnapshotCache, MemorySnapshotCache, SnapshotCache};
pub use error::{Result, StorageError};
pub use registrations::{JsonRegistrationStore, MemoryRegistrationStore, RegistrationStore};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reject keys that could escape their storage directory.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let escapes = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if escapes {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Write `bytes` to a temporary sibling of `path`, then rename it into place.
pub(crate) async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(format!(
        ".tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp: PathBuf = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("index.html").is_ok());
        assert!(validate_key("docs/guide/index.html").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("/etc/passwd").is_err());
    }
}
