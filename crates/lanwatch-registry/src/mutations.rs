//! Write operations on the registry.
//!
//! Every operation takes the writer lock, mutates the working document,
//! and persists it before releasing the lock.

use std::borrow::Cow;
use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use lanwatch_core::{
    normalize_mac, ChangeEvent, ChangeType, DeviceRecord, FusedDevice, HistoryEntry,
};
use lanwatch_fusion::{detect_changes, DeviceView};
use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::registry::{Registry, WorkingState};

/// Summary of applying one scan to the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateOutcome {
    /// Records created by this scan.
    pub new: usize,
    /// Existing records that emitted at least one change event.
    pub updated: usize,
    pub changes: Vec<ChangeEvent>,
    /// False when the write to disk failed; the changes are retried with
    /// the next write.
    pub persisted: bool,
    pub persist_warning: Option<String>,
}

impl Registry {
    /// Apply a completed scan. Every known record absent from `fused` is
    /// marked offline.
    pub async fn update_from_scan(&self, fused: &[FusedDevice]) -> UpdateOutcome {
        self.apply_scan(None, fused).await
    }

    /// Apply a completed scan of `subnet`. Only absent records whose
    /// current IP lies inside `subnet` (or who have no IP) are marked
    /// offline.
    pub async fn update_from_subnet_scan(
        &self,
        subnet: &IpNet,
        fused: &[FusedDevice],
    ) -> UpdateOutcome {
        self.apply_scan(Some(subnet), fused).await
    }

    async fn apply_scan(&self, scope: Option<&IpNet>, fused: &[FusedDevice]) -> UpdateOutcome {
        let mut state = self.lock().await;
        let now = Utc::now();
        let mut outcome = UpdateOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();

        for device in fused {
            let mac = match normalize_mac(&device.mac) {
                Ok(mac) => mac,
                Err(e) => {
                    tracing::warn!(mac = %device.mac, error = %e, "Skipping fused device");
                    continue;
                }
            };
            let device: Cow<'_, FusedDevice> = if device.mac == mac {
                Cow::Borrowed(device)
            } else {
                Cow::Owned(FusedDevice {
                    mac: mac.clone(),
                    ..device.clone()
                })
            };
            if !seen.insert(mac.clone()) {
                tracing::warn!(mac = %mac, "Duplicate fused device in one scan, keeping the first");
                continue;
            }

            let events = match state.doc.devices.get_mut(&mac) {
                None => {
                    let mut record = DeviceRecord::new(&mac, now);
                    apply_sighting(&mut record, &device, now);
                    self.classify(&mut record, &device);
                    state.doc.devices.insert(mac.clone(), record);
                    outcome.new += 1;
                    detect_changes(None, &device, now)
                }
                Some(record) => {
                    let previous = DeviceView::from(&*record);
                    let mut events = detect_changes(Some(&previous), &device, now);
                    if record.vendor.is_none() {
                        if let Some(vendor) = &device.vendor {
                            events.push(ChangeEvent::new(
                                &mac,
                                ChangeType::VendorUpdated,
                                None,
                                Some(vendor.clone()),
                                device.confidence_score,
                                now,
                            ));
                        }
                    }
                    apply_sighting(record, &device, now);
                    self.classify(record, &device);
                    if !events.is_empty() {
                        outcome.updated += 1;
                    }
                    events
                }
            };
            outcome.changes.extend(events);
        }

        for record in state.doc.devices.values_mut() {
            if seen.contains(&record.mac) || !record.is_online || !in_scope(record, scope) {
                continue;
            }
            record.is_online = false;
            record.is_vpn_connected = false;
            outcome.changes.push(ChangeEvent::new(
                &record.mac,
                ChangeType::DeviceOffline,
                Some(true.to_string()),
                Some(false.to_string()),
                record.confidence_score,
                now,
            ));
            outcome.updated += 1;
        }

        state.dirty = true;
        match self.persist_locked(&mut state).await {
            Ok(()) => outcome.persisted = true,
            Err(e) => outcome.persist_warning = Some(e.to_string()),
        }

        tracing::info!(
            devices = fused.len(),
            new = outcome.new,
            updated = outcome.updated,
            changes = outcome.changes.len(),
            persisted = outcome.persisted,
            "Registry updated from scan"
        );

        outcome
    }

    /// Flag a device as managed (or not).
    pub async fn mark_as_managed(&self, mac: &str, managed: bool) -> Result<DeviceRecord> {
        self.modify(mac, |record| record.is_managed = managed).await
    }

    /// Set or clear free-form notes on a device.
    pub async fn set_notes(&self, mac: &str, notes: Option<String>) -> Result<DeviceRecord> {
        self.modify(mac, |record| record.notes = notes).await
    }

    /// Record vendor names resolved by enrichment. Emits one
    /// `VENDOR_UPDATED` per record whose vendor actually changed and
    /// persists once.
    pub async fn apply_vendors(&self, vendors: &[(String, String)]) -> Result<Vec<ChangeEvent>> {
        let mut state = self.lock().await;
        let was_dirty = state.dirty;
        let now = Utc::now();
        let mut events = Vec::new();
        let mut previous = Vec::new();

        for (mac, vendor) in vendors {
            let Ok(mac) = normalize_mac(mac) else {
                continue;
            };
            let Some(record) = state.doc.devices.get_mut(&mac) else {
                continue;
            };
            if record.vendor.as_deref() == Some(vendor.as_str()) {
                continue;
            }
            previous.push(record.clone());
            events.push(ChangeEvent::new(
                &mac,
                ChangeType::VendorUpdated,
                record.vendor.clone(),
                Some(vendor.clone()),
                record.confidence_score,
                now,
            ));
            record.vendor = Some(vendor.clone());
            let classification = self.classifier.classify(record);
            if classification.device_type.is_some() {
                record.device_type = classification.device_type;
            }
        }

        if events.is_empty() {
            return Ok(events);
        }

        state.dirty = true;
        self.persist_or_restore(&mut state, previous, was_dirty)
            .await?;
        tracing::info!(count = events.len(), "Vendor enrichment applied");
        Ok(events)
    }

    /// Edit one record. A failed persist undoes the edit, so an `Err`
    /// never lands on disk later.
    async fn modify(
        &self,
        mac: &str,
        f: impl FnOnce(&mut DeviceRecord),
    ) -> Result<DeviceRecord> {
        let mac = normalize_mac(mac)?;
        let mut state = self.lock().await;
        let was_dirty = state.dirty;
        let record = state
            .doc
            .devices
            .get_mut(&mac)
            .ok_or_else(|| RegistryError::NotFound { mac: mac.clone() })?;
        let previous = record.clone();
        f(record);
        let updated = record.clone();

        state.dirty = true;
        self.persist_or_restore(&mut state, vec![previous], was_dirty)
            .await?;
        Ok(updated)
    }

    /// Persist, or put `previous` records back and restore the dirty flag.
    async fn persist_or_restore(
        &self,
        state: &mut WorkingState,
        previous: Vec<DeviceRecord>,
        was_dirty: bool,
    ) -> Result<()> {
        if let Err(e) = self.persist_locked(state).await {
            for record in previous {
                state.doc.devices.insert(record.mac.clone(), record);
            }
            state.dirty = was_dirty;
            return Err(e);
        }
        Ok(())
    }

    /// Apply the classifier and fold its contribution into the confidence.
    fn classify(&self, record: &mut DeviceRecord, device: &FusedDevice) {
        let classification = self.classifier.classify(record);
        if classification.device_type.is_some() {
            record.device_type = classification.device_type;
        }
        if record.os_detected.is_none() {
            record.os_detected = classification.os_guess;
        }
        record.confidence_score =
            (device.confidence_score + classification.confidence_contribution).clamp(0.0, 1.0);
    }
}

/// Copy one fused sighting onto its durable record.
fn apply_sighting(record: &mut DeviceRecord, device: &FusedDevice, now: DateTime<Utc>) {
    if let Some(ip) = &device.ip {
        upsert_history(&mut record.ip_history, ip, now);
        record.current_ip = Some(ip.clone());
    }
    if let Some(hostname) = &device.hostname {
        upsert_history(&mut record.hostname_history, hostname, now);
        record.current_hostname = Some(hostname.clone());
    }
    if record.vendor.is_none() {
        record.vendor = device.vendor.clone();
    }
    if device.os_guess.is_some() {
        record.os_detected = device.os_guess.clone();
    }

    record.is_online = device.is_online;
    record.last_seen = now;
    if device.is_online {
        record.last_seen_online = Some(now);
        record.total_detections += 1;
        record.last_response_time_ms = device.response_time_ms;
    }

    record.is_vpn_connected = device.is_vpn_connected;
    if device.vpn_ip.is_some() {
        record.vpn_ip = device.vpn_ip.clone();
    }
    record.sources = device.sources.clone();
}

/// Refresh the entry for `value`, moving it to the end, or append a new
/// one. The last entry is always the current value.
fn upsert_history(history: &mut Vec<HistoryEntry>, value: &str, now: DateTime<Utc>) {
    match history.iter().position(|e| e.value == value) {
        Some(idx) => {
            let mut entry = history.remove(idx);
            entry.last_seen = now;
            entry.occurrence_count += 1;
            history.push(entry);
        }
        None => history.push(HistoryEntry::new(value, now)),
    }
}

fn in_scope(record: &DeviceRecord, scope: Option<&IpNet>) -> bool {
    let Some(subnet) = scope else {
        return true;
    };
    match record.current_ip.as_deref().map(str::parse::<IpAddr>) {
        Some(Ok(ip)) => subnet.contains(&ip),
        _ => true,
    }
}
