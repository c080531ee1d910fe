//! lanwatch-core: Shared types for the lanwatch device registry.
//!
//! This crate provides the foundational types used across all lanwatch components:
//! - Observations produced by discovery sources
//! - Fused single-scan device views and durable device records
//! - Change events and conflict findings
//! - MAC address normalization
//! - Common error types

pub mod error;
pub mod events;
pub mod mac;
pub mod types;

pub use error::CoreError;
pub use events::{ChangeEvent, ChangeType, EventId};
pub use mac::normalize_mac;
pub use types::{
    ConflictRecord, ConflictType, DataQuality, DeviceRecord, FusedDevice, HistoryEntry,
    Observation, ScanKind, ScanSample, Severity, Source,
};
