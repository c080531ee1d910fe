//! lanwatch-discover: LAN device discovery.
//!
//! Runs the discovery sources against a subnet one at a time, fuses what
//! they report into one view per MAC, applies the result to the device
//! registry, and records a tamper-evident journal entry for every scan.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod journal;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod sources;
pub mod tool;

pub use error::{DiscoverError, Result};
pub use orchestrator::{ScanOrchestrator, ScanReport, ScanStats};
pub use scheduler::{ScanResult, ScanScheduler};
pub use service::DiscoveryService;
