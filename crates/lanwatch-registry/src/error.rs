use std::path::PathBuf;

use lanwatch_core::CoreError;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Device not found: {mac}")]
    NotFound { mac: String },

    #[error("Invalid device identity: {0}")]
    InvalidMac(#[from] CoreError),

    #[error("Failed to read registry {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to persist registry to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported registry schema version {0}")]
    UnsupportedVersion(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
