//! Conflict detection over a full device set.
//!
//! Severity: `(0.5 + 0.5 × (1 − 1/n)) × (0.3 + 0.7 × exp(−age / 1h))` where
//! `n` is the number of participants and `age` is how long ago the
//! least-recently-updated participant was seen.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use lanwatch_core::{ConflictRecord, ConflictType, DeviceRecord, FusedDevice, Severity};

const STALENESS_TAU_SECS: f64 = 3600.0;

/// Anything that can take part in a uniqueness conflict.
pub trait ConflictSubject {
    fn mac(&self) -> &str;
    fn current_ip(&self) -> Option<&str>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn alternate_ips(&self) -> &[String] {
        &[]
    }
}

impl ConflictSubject for FusedDevice {
    fn mac(&self) -> &str {
        &self.mac
    }

    fn current_ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.last_observed
    }

    fn alternate_ips(&self) -> &[String] {
        &self.alternate_ips
    }
}

impl ConflictSubject for DeviceRecord {
    fn mac(&self) -> &str {
        &self.mac
    }

    fn current_ip(&self) -> Option<&str> {
        self.current_ip.as_deref()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.last_seen
    }
}

/// Flag every IP held by two or more distinct MACs, and every MAC seen on
/// more than one IP.
pub fn detect_conflicts<T: ConflictSubject>(devices: &[T], now: DateTime<Utc>) -> Vec<ConflictRecord> {
    let mut by_ip: BTreeMap<&str, BTreeMap<&str, DateTime<Utc>>> = BTreeMap::new();
    let mut by_mac: BTreeMap<&str, (BTreeSet<&str>, DateTime<Utc>)> = BTreeMap::new();

    for device in devices {
        let updated = device.updated_at();
        if let Some(ip) = device.current_ip() {
            let holders = by_ip.entry(ip).or_default();
            let seen = holders.entry(device.mac()).or_insert(updated);
            *seen = (*seen).min(updated);
        }

        let (ips, oldest) = by_mac
            .entry(device.mac())
            .or_insert_with(|| (BTreeSet::new(), updated));
        *oldest = (*oldest).min(updated);
        ips.extend(device.current_ip());
        ips.extend(device.alternate_ips().iter().map(String::as_str));
    }

    let mut conflicts = Vec::new();

    for (ip, holders) in by_ip {
        if holders.len() < 2 {
            continue;
        }
        let oldest = holders.values().min().copied().unwrap_or(now);
        let score = severity_score(holders.len(), oldest, now);
        let macs: Vec<String> = holders.keys().map(|m| m.to_string()).collect();
        conflicts.push(ConflictRecord {
            conflict_type: ConflictType::IpConflict,
            description: format!("{} devices claim {ip}: {}", macs.len(), macs.join(", ")),
            affected_macs: macs,
            value: ip.to_string(),
            severity: Severity::from_score(score),
            severity_score: score,
        });
    }

    for (mac, (ips, oldest)) in by_mac {
        if ips.len() < 2 {
            continue;
        }
        let score = severity_score(ips.len(), oldest, now);
        let listed: Vec<&str> = ips.into_iter().collect();
        conflicts.push(ConflictRecord {
            conflict_type: ConflictType::MacDuplicate,
            affected_macs: vec![mac.to_string()],
            value: mac.to_string(),
            description: format!("{mac} answered on {}", listed.join(", ")),
            severity: Severity::from_score(score),
            severity_score: score,
        });
    }

    if !conflicts.is_empty() {
        tracing::debug!(count = conflicts.len(), "Conflicts detected");
    }

    conflicts
}

fn severity_score(participants: usize, oldest: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let n = participants.max(1) as f64;
    let size_term = 1.0 - 1.0 / n;
    let age_secs = (now - oldest).num_seconds().max(0) as f64;
    let freshness = (-age_secs / STALENESS_TAU_SECS).exp();
    ((0.5 + 0.5 * size_term) * (0.3 + 0.7 * freshness)).clamp(0.0, 1.0)
}
