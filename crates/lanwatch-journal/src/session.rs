//! Builder for a scan entry, filled in as the scan pipeline progresses.
//!
//! ```no_run
//! # use lanwatch_journal::session::ScanSession;
//! # use lanwatch_journal::{SourceReport, SourceStatus};
//! # use lanwatch_core::Source;
//! let mut session = ScanSession::new("192.168.1.0/24");
//! session.record_source(SourceReport {
//!     source: Source::Arp,
//!     status: SourceStatus::Ok,
//!     observation_count: 12,
//!     duration_ms: 8,
//!     detail: None,
//! });
//! let entry = session.finalize().unwrap();
//! assert!(entry.verify_integrity());
//! ```

use chrono::Utc;
use lanwatch_core::{ChangeEvent, ConflictRecord, DeviceRecord};

use crate::{DeviceSample, Result, ScanEntry, ScanId, SourceReport};

pub struct ScanSession {
    entry: ScanEntry,
}

impl ScanSession {
    /// Start recording a scan of `subnet`.
    pub fn new(subnet: &str) -> Self {
        Self {
            entry: ScanEntry {
                id: ScanId::new(),
                subnet: subnet.to_string(),
                sources: Vec::new(),
                samples: Vec::new(),
                changes: Vec::new(),
                conflicts: Vec::new(),
                started_at: Utc::now(),
                completed_at: None,
                content_hash: None,
            },
        }
    }

    pub fn record_source(&mut self, report: SourceReport) {
        self.entry.sources.push(report);
    }

    /// Snapshot the presence state of every device.
    pub fn record_samples<'a>(&mut self, devices: impl IntoIterator<Item = &'a DeviceRecord>) {
        self.entry.samples.extend(devices.into_iter().map(|d| DeviceSample {
            mac: d.mac.clone(),
            ip: d.current_ip.clone(),
            is_online: d.is_online,
            response_time_ms: d.is_online.then_some(d.last_response_time_ms).flatten(),
        }));
    }

    pub fn record_changes(&mut self, changes: &[ChangeEvent]) {
        self.entry.changes.extend_from_slice(changes);
    }

    pub fn record_conflicts(&mut self, conflicts: &[ConflictRecord]) {
        self.entry.conflicts.extend_from_slice(conflicts);
    }

    /// The scan ID (available before finalization).
    pub fn id(&self) -> ScanId {
        self.entry.id
    }

    /// Stamp `completed_at` and compute the content hash.
    pub fn finalize(mut self) -> Result<ScanEntry> {
        self.entry.completed_at = Some(Utc::now());
        let hash = self.entry.compute_hash()?;
        self.entry.content_hash = Some(hash);
        Ok(self.entry)
    }
}
