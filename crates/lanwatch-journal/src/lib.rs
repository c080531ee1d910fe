//! lanwatch-journal: Tamper-evident scan journal.
//!
//! Every orchestrated scan produces one `ScanEntry`: which sources ran and
//! how they fared, the presence state of every known device at the end of
//! the scan, the change events the registry emitted, and the conflicts the
//! scan surfaced. Each entry is content-hashed with BLAKE3 so edits to the
//! on-disk file are detectable, and the per-device samples feed uptime
//! statistics.

pub mod error;
pub mod hash;
pub mod session;
pub mod store;

use chrono::{DateTime, Utc};
use lanwatch_core::{ChangeEvent, ConflictRecord, ScanSample, Source};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{JournalError, Result};
pub use session::ScanSession;
pub use store::{FileJournalStore, JournalQuery, JournalStore};

// ── Core Types ───────────────────────────────────────────────────

/// Unique identifier for one orchestrated scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How one source fared during a scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    TimedOut,
    /// The backing tool is not installed; skipped until restart.
    Unavailable,
    /// Previously found unavailable and not attempted.
    Skipped,
    Failed,
}

/// Per-source outcome of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReport {
    pub source: Source,
    pub status: SourceStatus,
    pub observation_count: usize,
    pub duration_ms: u64,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One device's state at the end of a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSample {
    pub mac: String,
    pub ip: Option<String>,
    pub is_online: bool,
    pub response_time_ms: Option<f64>,
}

/// The complete record of one orchestrated scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanEntry {
    pub id: ScanId,
    /// The scanned CIDR.
    pub subnet: String,
    pub sources: Vec<SourceReport>,
    /// State of every registry device after the scan was applied.
    pub samples: Vec<DeviceSample>,
    pub changes: Vec<ChangeEvent>,
    pub conflicts: Vec<ConflictRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// BLAKE3 content hash (hex), set on finalization.
    pub content_hash: Option<String>,
}

impl ScanEntry {
    /// Compute the BLAKE3 hash over every field except `content_hash`.
    pub fn compute_hash(&self) -> Result<String> {
        hash::compute_entry_hash(self)
    }

    /// Whether the stored hash matches the content.
    pub fn verify_integrity(&self) -> bool {
        match (&self.content_hash, self.compute_hash()) {
            (Some(stored), Ok(fresh)) => *stored == fresh,
            _ => false,
        }
    }

    /// The device's sample in this scan, timestamped at scan completion.
    pub fn sample_for(&self, mac: &str) -> Option<ScanSample> {
        let sample = self.samples.iter().find(|s| s.mac == mac)?;
        Some(ScanSample {
            timestamp: self.completed_at.unwrap_or(self.started_at),
            is_online: sample.is_online,
            response_time_ms: sample.response_time_ms,
        })
    }
}
