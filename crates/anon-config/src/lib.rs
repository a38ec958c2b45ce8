use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for anon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL self links are rewritten to. Defaults to `http://host:port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of registrations and cached pages. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_binary_threshold")]
    pub binary_threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Serialize snapshot checks per repository.
    #[serde(default)]
    pub lock_invalidation: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            binary_threshold: default_binary_threshold(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_max_file_size() -> u64 {
    1_000_000
}

fn default_binary_threshold() -> f64 {
    0.30
}

impl ServerConfig {
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

impl GithubConfig {
    /// Configured token, else `GITHUB_TOKEN` from the environment.
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".anon")),
        }
    }

    pub fn registrations_dir(&self) -> PathBuf {
        self.data_dir().join("registrations")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "anon", "anon")
}

impl Config {
    /// Load config from default location or create default if not found
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, writing the defaults there if it is missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            Ok(config)
        }
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = project_dirs() {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from(".anon/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.render.max_file_size, 1_000_000);
        assert_eq!(config.render.binary_threshold, 0.30);
        assert!(!config.cache.lock_invalidation);
        assert_eq!(config.server.public_url(), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.github.api_url, config.github.api_url);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            public_url = "https://anon.example/"

            [cache]
            lock_invalidation = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.public_url(), "https://anon.example");
        assert!(config.cache.lock_invalidation);
        assert_eq!(config.render.max_file_size, 1_000_000);
    }

    #[test]
    fn test_load_from_writes_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, 5000);

        std::fs::write(&path, "[server]\nport = 8080\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_storage_dirs() {
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/srv/anon")),
        };
        assert_eq!(storage.registrations_dir(), PathBuf::from("/srv/anon/registrations"));
        assert_eq!(storage.cache_dir(), PathBuf::from("/srv/anon/cache"));
    }
}
