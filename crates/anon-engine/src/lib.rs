//! Request pipeline for anonymized repositories
//!
//! [`Pipeline::handle`] takes a repository id and a browse path and runs the
//! whole request: snapshot check, cache lookup, tree resolution, rendering
//! with redaction, and the cache write. Cache reads and writes are scoped to
//! the snapshot the request resolved, so a render that outlives a snapshot
//! change is never served.

pub mod render;
pub mod resolver;

use std::sync::Arc;

use anon_core::{Error, Registration, RenderedPage, Snapshot};
use anon_security::Redactor;
use anon_sources::RepositoryProvider;
use anon_storage::{CacheKey, CacheMetadata, RegistrationStore, SnapshotCache};
use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::sync::Mutex;

pub use render::{RenderContext, RenderEngine, RenderLimits};
pub use resolver::{Resolution, Resolved, TreeResolver};

/// Path prefix of commit views inside a repository.
pub const COMMIT_PREFIX: &str = "-/commit/";

/// What a request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Page {
        page: RenderedPage,
        /// BLAKE3 digest of the bytes.
        etag: String,
    },
    /// The path names a directory; re-request it with a trailing `/`.
    Redirect,
    NotFound,
    SnapshotUnavailable,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Public base URL self links are rewritten to.
    pub public_url: String,
    pub limits: RenderLimits,
    /// Serialize the snapshot check per repository.
    pub lock_invalidation: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:5000".to_string(),
            limits: RenderLimits::default(),
            lock_invalidation: false,
        }
    }
}

/// Cache key of a request.
pub fn cache_key(path: &str, is_directory: bool) -> CacheKey {
    if let Some(sha) = path.strip_prefix(COMMIT_PREFIX) {
        return CacheKey::Commit(sha.to_string());
    }
    let trimmed = path.trim_matches('/');
    if is_directory {
        CacheKey::Directory(trimmed.to_string())
    } else {
        CacheKey::File(trimmed.to_string())
    }
}

/// Keys tried on a cache lookup, most specific first. Only directory-shaped
/// requests fall back to a cached readme.
fn lookup_keys(path: &str) -> Vec<CacheKey> {
    let trimmed = path.trim_matches('/');
    if path.starts_with(COMMIT_PREFIX) || !(trimmed.is_empty() || path.ends_with('/')) {
        return vec![cache_key(path, false)];
    }
    let readme = if trimmed.is_empty() {
        "README.md".to_string()
    } else {
        format!("{}/README.md", trimmed)
    };
    vec![cache_key(path, true), CacheKey::File(readme)]
}

pub struct Pipeline {
    provider: Arc<dyn RepositoryProvider>,
    cache: Arc<dyn SnapshotCache>,
    registrations: Arc<dyn RegistrationStore>,
    resolver: TreeResolver,
    renderer: RenderEngine,
    public_url: String,
    locks: Option<DashMap<String, Arc<Mutex<()>>>>,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn RepositoryProvider>,
        cache: Arc<dyn SnapshotCache>,
        registrations: Arc<dyn RegistrationStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver: TreeResolver::new(provider.clone()),
            renderer: RenderEngine::new(provider.clone(), options.limits),
            provider,
            cache,
            registrations,
            public_url: options.public_url.trim_end_matches('/').to_string(),
            locks: options.lock_invalidation.then(DashMap::new),
        }
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn registrations(&self) -> &Arc<dyn RegistrationStore> {
        &self.registrations
    }

    /// Serve `raw_path` of repository `repository_id`.
    pub async fn handle(&self, repository_id: &str, raw_path: &str) -> Result<Outcome> {
        let raw_path = raw_path.trim_start_matches('/');

        // 1. Registration
        let Some(registration) = self
            .registrations
            .load(repository_id)
            .await
            .context("Failed to load registration")?
        else {
            tracing::debug!(repository_id, "unknown repository");
            return Ok(Outcome::NotFound);
        };

        // 2. Live snapshot, invalidating the cache when it moved
        let snapshot = match self.provider.get_commit(&registration.origin).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(repository_id, error = %e, "cannot resolve live snapshot");
                return Ok(Outcome::SnapshotUnavailable);
            }
        };
        let registration = self.ensure_current(registration, &snapshot).await?;

        // 3. Cache
        for key in lookup_keys(raw_path) {
            match self.cache.get(repository_id, &snapshot, &key).await {
                Ok(Some(entry)) => {
                    tracing::debug!(repository_id, key = %key, "cache hit");
                    return Ok(Outcome::Page {
                        page: entry.page,
                        etag: entry.metadata.digest,
                    });
                }
                Ok(None) => {}
                // Keys that cannot be stored are never cached.
                Err(e) => tracing::debug!(repository_id, key = %key, error = %e, "cache lookup skipped"),
            }
        }
        tracing::debug!(repository_id, path = raw_path, "cache miss");

        // 4. Resolve
        let resolved = match raw_path.strip_prefix(COMMIT_PREFIX) {
            Some(sha) => self.resolver.resolve_commit(&registration.origin, sha).await,
            None => self.resolver.resolve(&registration.origin, &snapshot, raw_path).await,
        };
        let resolution = match resolved {
            Ok(Resolved::Found(resolution)) => resolution,
            Ok(Resolved::NotFound) => return Ok(Outcome::NotFound),
            Err(e) if e.is_provider_failure() => return Ok(Outcome::SnapshotUnavailable),
            Err(e) => return Err(e.into()),
        };
        if resolution.needs_trailing_slash {
            return Ok(Outcome::Redirect);
        }

        // 5. Render
        let redactor = Redactor::for_registration(&registration, &self.public_url)
            .context("Failed to compile redaction patterns")?;
        let base_url = format!("/repository/{}", registration.id);
        let ctx = RenderContext {
            registration: &registration,
            snapshot: &snapshot,
            redactor: &redactor,
            path: raw_path,
            base_url: &base_url,
        };
        let page = match self.renderer.render(&ctx, &resolution).await {
            Ok(page) => page,
            Err(e) if e.is_provider_failure() => return Ok(Outcome::SnapshotUnavailable),
            Err(Error::NotFound(_)) => return Ok(Outcome::NotFound),
            Err(e) => return Err(e.into()),
        };

        // 6. Cache write, under the snapshot this page was rendered from
        let key = cache_key(raw_path, resolution.is_directory());
        let metadata = match self.cache.put(repository_id, &snapshot, &key, &page).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(repository_id, key = %key, error = %e, "failed to cache rendered page");
                CacheMetadata::for_page(&page)
            }
        };

        Ok(Outcome::Page {
            page,
            etag: metadata.digest,
        })
    }

    /// Make sure the cache of `registration` belongs to `live`, wiping it
    /// and recording the new snapshot otherwise.
    async fn ensure_current(&self, registration: Registration, live: &Snapshot) -> Result<Registration> {
        if registration.is_current(live) {
            return Ok(registration);
        }

        let Some(locks) = &self.locks else {
            return self.invalidate(registration, live).await;
        };

        let lock = locks
            .entry(registration.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another request may have finished the switch while we waited.
        let current = self
            .registrations
            .load(&registration.id)
            .await
            .context("Failed to reload registration")?
            .unwrap_or(registration);
        if current.is_current(live) {
            return Ok(current);
        }
        self.invalidate(current, live).await
    }

    async fn invalidate(&self, mut registration: Registration, live: &Snapshot) -> Result<Registration> {
        tracing::info!(
            repository_id = %registration.id,
            previous = ?registration.last_snapshot.as_ref().map(Snapshot::as_str),
            current = %live,
            "snapshot changed, invalidating cache"
        );
        self.cache
            .invalidate_all(&registration.id)
            .await
            .context("Failed to invalidate snapshot cache")?;
        registration.last_snapshot = Some(live.clone());
        self.registrations
            .save(&registration)
            .await
            .context("Failed to save registration")?;
        Ok(registration)
    }

    /// Drop the cache of a repository and forget its snapshot, so the next
    /// request rebuilds everything.
    pub async fn invalidate_repository(&self, repository_id: &str) -> Result<bool> {
        let Some(mut registration) = self.registrations.load(repository_id).await? else {
            return Ok(false);
        };
        self.cache.invalidate_all(repository_id).await?;
        registration.last_snapshot = None;
        self.registrations.save(&registration).await?;
        tracing::info!(repository_id, "cache invalidated");
        Ok(true)
    }
}
