pub mod invalidate;
pub mod register;
pub mod serve;

use anon_config::Config;
use anon_engine::{Pipeline, PipelineOptions, RenderLimits};
use anon_sources::GithubProvider;
use anon_storage::{FsSnapshotCache, JsonRegistrationStore};
use anyhow::Result;
use std::sync::Arc;

pub fn registration_store(config: &Config) -> Result<JsonRegistrationStore> {
    Ok(JsonRegistrationStore::new(config.storage.registrations_dir())?)
}

/// Wire the pipeline with the GitHub provider and filesystem storage.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let provider = GithubProvider::new(&config.github.api_url, config.github.token())?;
    let cache = FsSnapshotCache::new(config.storage.cache_dir())?;
    let registrations = registration_store(config)?;

    let options = PipelineOptions {
        public_url: config.server.public_url(),
        limits: RenderLimits {
            max_file_size: config.render.max_file_size,
            binary_threshold: config.render.binary_threshold,
        },
        lock_invalidation: config.cache.lock_invalidation,
    };

    Ok(Pipeline::new(
        Arc::new(provider),
        Arc::new(cache),
        Arc::new(registrations),
        options,
    ))
}
