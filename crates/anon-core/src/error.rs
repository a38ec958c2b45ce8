use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Registration not found: {0}")]
    RegistrationNotFound(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the failure came from talking to the remote tree provider.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::SnapshotUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
