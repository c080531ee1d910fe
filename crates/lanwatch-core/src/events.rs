//! Change events emitted when a device's state transitions between scans.
//!
//! Events are immutable once built. They are returned to callers of a
//! registry update and appended to the scan journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of transition a change event records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    NewDevice,
    IpChanged,
    HostnameChanged,
    VendorUpdated,
    DeviceOnline,
    DeviceOffline,
}

/// A detected transition between two snapshots of the same device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub id: EventId,
    pub mac: String,
    pub change_type: ChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Confidence of the device view that produced this event.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        mac: &str,
        change_type: ChangeType,
        old_value: Option<String>,
        new_value: Option<String>,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            mac: mac.to_string(),
            change_type,
            old_value,
            new_value,
            confidence,
            timestamp,
        }
    }
}
