//! Registration persistence

use std::path::PathBuf;

use anon_core::Registration;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::{Result, StorageError, atomic_write, validate_key};

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Registration>>;

    async fn save(&self, registration: &Registration) -> Result<()>;

    async fn list(&self) -> Result<Vec<Registration>>;
}

/// One `config.json` per registration: `<root>/<id>/config.json`.
pub struct JsonRegistrationStore {
    root: PathBuf,
}

impl JsonRegistrationStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn config_path(&self, id: &str) -> Result<PathBuf> {
        if id.contains('/') {
            return Err(StorageError::InvalidKey(id.to_string()));
        }
        validate_key(id)?;
        Ok(self.root.join(id).join("config.json"))
    }
}

#[async_trait]
impl RegistrationStore for JsonRegistrationStore {
    async fn load(&self, id: &str) -> Result<Option<Registration>> {
        let path = match self.config_path(id) {
            Ok(path) => path,
            // An id that cannot be stored cannot have been registered.
            Err(StorageError::InvalidKey(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, registration: &Registration) -> Result<()> {
        let path = self.config_path(&registration.id)?;
        atomic_write(&path, &serde_json::to_vec_pretty(registration)?).await
    }

    async fn list(&self) -> Result<Vec<Registration>> {
        let mut registrations = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.load(&id).await {
                Ok(Some(registration)) => registrations.push(registration),
                Ok(None) => {}
                Err(e) => tracing::warn!(id, error = %e, "skipping unreadable registration"),
            }
        }
        registrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(registrations)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    registrations: DashMap<String, Registration>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn load(&self, id: &str) -> Result<Option<Registration>> {
        Ok(self.registrations.get(id).map(|r| r.clone()))
    }

    async fn save(&self, registration: &Registration) -> Result<()> {
        self.registrations
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Registration>> {
        let mut registrations: Vec<Registration> =
            self.registrations.iter().map(|r| r.value().clone()).collect();
        registrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(registrations)
    }
}
