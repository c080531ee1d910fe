use thiserror::Error;

/// Errors raised by the shared lanwatch types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid MAC address: {0:?}")]
    InvalidMac(String),

    #[error("Unknown discovery source: {0}")]
    UnknownSource(String),
}
