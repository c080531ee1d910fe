//! Scan journal helpers for the scan pipeline.

use std::net::IpAddr;

use ipnet::IpNet;
use lanwatch_core::DeviceRecord;
use lanwatch_journal::{JournalStore, ScanEntry, ScanSession};
use lanwatch_registry::{RegistryDocument, UpdateOutcome};

use crate::orchestrator::ScanReport;

/// Create a journal session for a scan of `subnet`.
pub fn start_scan_session(subnet: &IpNet) -> ScanSession {
    ScanSession::new(&subnet.to_string())
}

/// Record what the orchestrator and the registry update produced.
///
/// Presence samples are taken from `snapshot` for every device that
/// belongs to the scanned subnet.
pub fn record_scan(
    session: &mut ScanSession,
    subnet: &IpNet,
    report: &ScanReport,
    outcome: &UpdateOutcome,
    snapshot: &RegistryDocument,
) {
    for source in &report.stats.sources {
        session.record_source(source.clone());
    }
    session.record_samples(
        snapshot
            .devices
            .values()
            .filter(|record| belongs_to(record, subnet)),
    );
    session.record_changes(&outcome.changes);
    session.record_conflicts(&report.conflicts);
}

/// Finalize the session and store the entry. Journal failures are logged,
/// never propagated: a scan that reached the registry is not undone.
pub fn finalize_and_store(session: ScanSession, store: &dyn JournalStore) -> Option<ScanEntry> {
    let entry = match session.finalize() {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to finalize scan entry");
            return None;
        }
    };

    match store.save(&entry) {
        Ok(()) => {
            tracing::info!(
                scan_id = %entry.id,
                samples = entry.samples.len(),
                changes = entry.changes.len(),
                "Scan entry recorded"
            );
        }
        Err(e) => {
            tracing::warn!(scan_id = %entry.id, error = %e, "Failed to store scan entry");
        }
    }
    Some(entry)
}

fn belongs_to(record: &DeviceRecord, subnet: &IpNet) -> bool {
    match record.current_ip.as_deref().map(str::parse::<IpAddr>) {
        Some(Ok(addr)) => subnet.contains(&addr),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lanwatch_journal::FileJournalStore;

    use crate::orchestrator::ScanStats;

    fn record(mac: &str, ip: Option<&str>, online: bool) -> DeviceRecord {
        let mut record = DeviceRecord::new(mac, Utc::now());
        record.current_ip = ip.map(str::to_string);
        record.is_online = online;
        record
    }

    #[test]
    fn test_samples_limited_to_subnet() {
        let subnet: IpNet = "192.168.1.0/24".parse().unwrap();
        let mut doc = RegistryDocument::new(Utc::now());
        for r in [
            record("AA:AA:AA:AA:AA:01", Some("192.168.1.10"), true),
            record("AA:AA:AA:AA:AA:02", Some("10.0.0.5"), true),
            record("AA:AA:AA:AA:AA:03", None, false),
        ] {
            doc.devices.insert(r.mac.clone(), r);
        }

        let report = ScanReport {
            subnet: subnet.to_string(),
            fused: Vec::new(),
            conflicts: Vec::new(),
            stats: ScanStats::default(),
        };

        let mut session = start_scan_session(&subnet);
        record_scan(&mut session, &subnet, &report, &UpdateOutcome::default(), &doc);

        let dir = tempfile::tempdir().unwrap();
        let store = FileJournalStore::new(dir.path()).unwrap();
        let entry = finalize_and_store(session, &store).unwrap();

        let macs: Vec<&str> = entry.samples.iter().map(|s| s.mac.as_str()).collect();
        assert_eq!(macs, vec!["AA:AA:AA:AA:AA:01", "AA:AA:AA:AA:AA:03"]);
        assert_eq!(store.get(entry.id).unwrap(), entry);
    }
}
