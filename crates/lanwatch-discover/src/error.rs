//! Error types for the lanwatch-discover crate.

use lanwatch_core::Source;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Source {scanner} timed out after {timeout_ms} ms")]
    SourceTimeout { scanner: Source, timeout_ms: u64 },

    #[error("{tool} exited with code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("Failed to parse nmap XML output: {0}")]
    XmlParse(String),

    #[error("Failed to parse {tool} output: {reason}")]
    OutputParse { tool: String, reason: String },

    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("Vendor lookup failed: {0}")]
    Lookup(String),

    #[error("Registry error: {0}")]
    Registry(#[from] lanwatch_registry::RegistryError),

    #[error("Journal error: {0}")]
    Journal(#[from] lanwatch_journal::JournalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
