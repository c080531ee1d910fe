//! On-disk registry document: load, migrate, atomic save.
//!
//! ```text
//! { "version": 2, "last_updated": "...", "devices": { "AA:BB:..": {..} } }
//! ```
//!
//! Version 1 documents kept histories as plain strings, named the current
//! values `ip`/`hostname`, and did not normalize MAC keys. They are
//! migrated on load after the original file is copied to
//! `<file>.v1.bak`.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lanwatch_core::{normalize_mac, DeviceRecord, HistoryEntry};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

pub const SCHEMA_VERSION: u64 = 2;

/// The whole persisted registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub version: u64,
    pub last_updated: DateTime<Utc>,
    pub devices: BTreeMap<String, DeviceRecord>,
}

impl RegistryDocument {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            last_updated: now,
            devices: BTreeMap::new(),
        }
    }
}

/// Load the document at `path`, migrating older schemas in place.
/// A missing file yields an empty document.
pub fn load(path: &Path) -> Result<RegistryDocument> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No registry file, starting empty");
        return Ok(RegistryDocument::new(Utc::now()));
    }

    let contents = fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(1);

    match version {
        SCHEMA_VERSION => {
            let doc: RegistryDocument = serde_json::from_value(value)?;
            tracing::info!(
                path = %path.display(),
                devices = doc.devices.len(),
                "Registry loaded"
            );
            Ok(doc)
        }
        1 => {
            let legacy: V1Document = serde_json::from_value(value)?;
            let backup = backup_path(path);
            fs::copy(path, &backup).map_err(|source| RegistryError::Persist {
                path: backup.clone(),
                source,
            })?;

            let doc = migrate_v1(legacy);
            save(path, &doc)?;
            tracing::info!(
                path = %path.display(),
                backup = %backup.display(),
                devices = doc.devices.len(),
                "Migrated registry from schema v1"
            );
            Ok(doc)
        }
        other => Err(RegistryError::UnsupportedVersion(other)),
    }
}

/// Write `doc` to `path` atomically: temp file, fsync, rename.
/// On failure the previous file is untouched.
pub fn save(path: &Path, doc: &RegistryDocument) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_err(parent))?;
    }

    let json = serde_json::to_string_pretty(doc)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).map_err(persist_err(&temp_path))?;
    file.write_all(json.as_bytes())
        .map_err(persist_err(&temp_path))?;
    file.sync_all().map_err(persist_err(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(persist_err(path))?;

    tracing::debug!(
        path = %path.display(),
        devices = doc.devices.len(),
        "Registry persisted"
    );
    Ok(())
}

fn persist_err(path: &Path) -> impl FnOnce(std::io::Error) -> RegistryError {
    let path = path.to_path_buf();
    move |source| RegistryError::Persist { path, source }
}

/// `<file>.v1.bak` next to the registry file.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".v1.bak");
    PathBuf::from(name)
}

// ── Schema v1 ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct V1Document {
    #[serde(default)]
    devices: HashMap<String, V1Record>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct V1Record {
    mac: Option<String>,
    ip: Option<String>,
    hostname: Option<String>,
    vendor: Option<String>,
    #[serde(alias = "os")]
    os_detected: Option<String>,
    device_type: Option<String>,
    is_online: bool,
    is_vpn_connected: bool,
    vpn_ip: Option<String>,
    ip_history: Vec<String>,
    hostname_history: Vec<String>,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    last_seen_online: Option<DateTime<Utc>>,
    total_detections: u64,
    confidence_score: f64,
    is_managed: bool,
    notes: Option<String>,
}

fn migrate_v1(legacy: V1Document) -> RegistryDocument {
    let now = Utc::now();
    let mut doc = RegistryDocument::new(now);

    for (key, old) in legacy.devices {
        let raw = old.mac.clone().unwrap_or(key);
        let mac = match normalize_mac(&raw) {
            Ok(mac) => mac,
            Err(e) => {
                tracing::warn!(mac = %raw, error = %e, "Dropping v1 record with invalid MAC");
                continue;
            }
        };

        let record = migrate_record(&mac, old, now);
        // Two legacy keys can normalize to one MAC; keep the fresher.
        match doc.devices.get(&mac) {
            Some(existing) if existing.last_seen >= record.last_seen => {}
            _ => {
                doc.devices.insert(mac, record);
            }
        }
    }

    doc
}

fn migrate_record(mac: &str, old: V1Record, now: DateTime<Utc>) -> DeviceRecord {
    let first_seen = old.first_seen.unwrap_or(now);
    let last_seen = old.last_seen.unwrap_or(first_seen);

    let ip_history = legacy_history(old.ip_history, old.ip.as_deref(), first_seen, last_seen);
    let hostname_history = legacy_history(
        old.hostname_history,
        old.hostname.as_deref(),
        first_seen,
        last_seen,
    );

    let mut record = DeviceRecord::new(mac, first_seen);
    record.current_ip = ip_history.last().map(|e| e.value.clone());
    record.current_hostname = hostname_history.last().map(|e| e.value.clone());
    record.ip_history = ip_history;
    record.hostname_history = hostname_history;
    record.vendor = old.vendor;
    record.os_detected = old.os_detected;
    record.device_type = old.device_type;
    record.is_online = old.is_online;
    record.is_vpn_connected = old.is_vpn_connected;
    record.vpn_ip = old.vpn_ip;
    record.last_seen = last_seen;
    record.last_seen_online = old.last_seen_online;
    record.total_detections = old.total_detections;
    record.confidence_score = old.confidence_score.clamp(0.0, 1.0);
    record.is_managed = old.is_managed;
    record.notes = old.notes;
    record
}

/// Deduplicate a plain-string history, moving `current` to the end.
fn legacy_history(
    values: Vec<String>,
    current: Option<&str>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = Vec::new();
    let current = current.map(str::trim).filter(|c| !c.is_empty());

    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match entries.iter_mut().find(|e| e.value == value) {
            Some(entry) => entry.occurrence_count += 1,
            None => entries.push(HistoryEntry::new(value, first_seen)),
        }
    }

    if let Some(current) = current {
        let entry = match entries.iter().position(|e| e.value == current) {
            Some(idx) => entries.remove(idx),
            None => HistoryEntry::new(current, first_seen),
        };
        entries.push(HistoryEntry {
            last_seen,
            ..entry
        });
    }

    entries
}
