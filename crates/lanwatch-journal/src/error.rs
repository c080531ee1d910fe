use crate::ScanId;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Scan entry not found: {0}")]
    NotFound(ScanId),

    #[error("Integrity check failed for scan entry {0}: stored hash does not match content")]
    IntegrityViolation(ScanId),

    #[error("Scan entry has no content hash (not finalized)")]
    NotFinalized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JournalError>;
