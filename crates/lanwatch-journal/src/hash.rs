//! BLAKE3 content hashing for tamper evidence.

use chrono::{DateTime, Utc};
use lanwatch_core::{ChangeEvent, ConflictRecord};
use serde::Serialize;

use crate::{DeviceSample, Result, ScanEntry, ScanId, SourceReport};

/// Hashable representation of a scan entry (excludes content_hash).
#[derive(Serialize)]
struct HashableEntry<'a> {
    id: &'a ScanId,
    subnet: &'a str,
    sources: &'a [SourceReport],
    samples: &'a [DeviceSample],
    changes: &'a [ChangeEvent],
    conflicts: &'a [ConflictRecord],
    started_at: &'a DateTime<Utc>,
    completed_at: &'a Option<DateTime<Utc>>,
}

/// Serialize every field except `content_hash` to JSON and hash the bytes.
/// Returns the hex-encoded digest.
pub fn compute_entry_hash(entry: &ScanEntry) -> Result<String> {
    let hashable = HashableEntry {
        id: &entry.id,
        subnet: &entry.subnet,
        sources: &entry.sources,
        samples: &entry.samples,
        changes: &entry.changes,
        conflicts: &entry.conflicts,
        started_at: &entry.started_at,
        completed_at: &entry.completed_at,
    };

    let json = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}
