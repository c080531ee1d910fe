//! Core domain types for the lanwatch device registry.
//!
//! Data flows through these types in one direction:
//! `Observation` (one source, one sighting) → `FusedDevice` (one scan,
//! one consensus view) → `DeviceRecord` (durable, one per MAC).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Sources ───────────────────────────────────────────────────────

/// A discovery source that produces observations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Active nmap host discovery.
    Nmap,
    /// ICMP echo sweep.
    Ping,
    /// Kernel neighbor (ARP) cache.
    Arp,
    /// Router/DHCP server lease table.
    Dhcp,
    /// Multicast DNS service browsing.
    Mdns,
    /// NetBIOS name resolution.
    Netbios,
    /// VPN overlay status (peers keyed by hostname, no MAC).
    Vpn,
}

impl Source {
    pub const ALL: [Source; 7] = [
        Source::Nmap,
        Source::Ping,
        Source::Arp,
        Source::Dhcp,
        Source::Mdns,
        Source::Netbios,
        Source::Vpn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Nmap => "nmap",
            Source::Ping => "ping",
            Source::Arp => "arp",
            Source::Dhcp => "dhcp",
            Source::Mdns => "mdns",
            Source::Netbios => "netbios",
            Source::Vpn => "vpn",
        }
    }

    /// How this source gathers its evidence.
    pub fn scan_kind(&self) -> ScanKind {
        match self {
            Source::Nmap | Source::Ping => ScanKind::Active,
            Source::Arp | Source::Dhcp => ScanKind::Passive,
            Source::Mdns | Source::Netbios => ScanKind::Resolved,
            Source::Vpn => ScanKind::Overlay,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .iter()
            .find(|src| src.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| CoreError::UnknownSource(s.to_string()))
    }
}

/// The way an observation was gathered. Ordered from most to least
/// trustworthy for overwritable fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    /// Direct probe of the host (it answered us).
    Active,
    /// Read from a cache some other party populated.
    Passive,
    /// Name resolved from a cache or multicast responder.
    Resolved,
    /// Overlay network membership; carries an overlay address, not a LAN one.
    Overlay,
}

// ── Observation ───────────────────────────────────────────────────

/// One source's sighting of one device during one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub source: Source,
    /// Empty only for sources that cannot see link-layer addresses.
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub os_guess: Option<String>,
    pub is_online: bool,
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub scan_kind: ScanKind,
}

impl Observation {
    /// Start an online observation from `source` stamped now.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            mac: None,
            ip: None,
            hostname: None,
            vendor: None,
            os_guess: None,
            is_online: true,
            response_time_ms: None,
            timestamp: Utc::now(),
            scan_kind: source.scan_kind(),
        }
    }

    pub fn with_mac(mut self, mac: &str) -> Self {
        self.mac = non_empty(mac);
        self
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = non_empty(ip);
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = non_empty(hostname);
        self
    }

    pub fn with_vendor(mut self, vendor: &str) -> Self {
        self.vendor = non_empty(vendor);
        self
    }

    pub fn with_os_guess(mut self, os: &str) -> Self {
        self.os_guess = non_empty(os);
        self
    }

    pub fn with_response_time(mut self, ms: f64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.is_online = online;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ── Fused device ──────────────────────────────────────────────────

/// Coarse quality grade of a fused view.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    #[default]
    Low,
    Medium,
    High,
}

/// Single-scan consensus view of one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedDevice {
    pub mac: String,
    pub ip: Option<String>,
    /// Other LAN addresses reported for this MAC in the same scan.
    #[serde(default)]
    pub alternate_ips: Vec<String>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub os_guess: Option<String>,
    pub is_online: bool,
    pub response_time_ms: Option<f64>,
    #[serde(default)]
    pub is_vpn_connected: bool,
    #[serde(default)]
    pub vpn_ip: Option<String>,
    pub sources: BTreeSet<Source>,
    pub confidence_score: f64,
    pub data_quality: DataQuality,
    /// Timestamp of the freshest contributing observation.
    pub last_observed: DateTime<Utc>,
}

// ── Durable record ────────────────────────────────────────────────

/// One historical value a device has held (an IP or a hostname).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub value: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u64,
}

impl HistoryEntry {
    pub fn new(value: &str, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            first_seen: now,
            last_seen: now,
            occurrence_count: 1,
        }
    }
}

pub type IpHistoryEntry = HistoryEntry;
pub type HostnameHistoryEntry = HistoryEntry;

/// Durable identity for one physical device, keyed by normalized MAC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    pub mac: String,
    pub current_ip: Option<String>,
    pub current_hostname: Option<String>,
    pub vendor: Option<String>,
    pub os_detected: Option<String>,
    pub device_type: Option<String>,
    pub is_online: bool,
    #[serde(default)]
    pub is_vpn_connected: bool,
    #[serde(default)]
    pub vpn_ip: Option<String>,
    #[serde(default)]
    pub ip_history: Vec<IpHistoryEntry>,
    #[serde(default)]
    pub hostname_history: Vec<HostnameHistoryEntry>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_seen_online: Option<DateTime<Utc>>,
    pub total_detections: u64,
    pub confidence_score: f64,
    #[serde(default)]
    pub is_managed: bool,
    #[serde(default)]
    pub notes: Option<String>,
    /// Sources that contributed to the latest sighting.
    #[serde(default)]
    pub sources: BTreeSet<Source>,
    #[serde(default)]
    pub last_response_time_ms: Option<f64>,
}

impl DeviceRecord {
    /// A blank record for a MAC first seen at `now`.
    pub fn new(mac: &str, now: DateTime<Utc>) -> Self {
        Self {
            mac: mac.to_string(),
            current_ip: None,
            current_hostname: None,
            vendor: None,
            os_detected: None,
            device_type: None,
            is_online: false,
            is_vpn_connected: false,
            vpn_ip: None,
            ip_history: Vec::new(),
            hostname_history: Vec::new(),
            first_seen: now,
            last_seen: now,
            last_seen_online: None,
            total_detections: 0,
            confidence_score: 0.0,
            is_managed: false,
            notes: None,
            sources: BTreeSet::new(),
            last_response_time_ms: None,
        }
    }

    /// A device that has held more than one distinct IP is DHCP-dynamic.
    pub fn is_dhcp_dynamic(&self) -> bool {
        self.ip_history.len() > 1
    }
}

// ── Conflicts ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// Two or more MACs currently claim the same IP.
    IpConflict,
    /// One MAC answered on more than one LAN address in the same scan.
    MacDuplicate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Severity::High
        } else if score >= 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Two or more devices violating a uniqueness invariant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictRecord {
    pub conflict_type: ConflictType,
    pub affected_macs: Vec<String>,
    /// The contested value (the shared IP, or the duplicated MAC).
    pub value: String,
    pub description: String,
    pub severity: Severity,
    /// Severity as a score in `[0.0, 1.0]`.
    pub severity_score: f64,
}

// ── Scan history ──────────────────────────────────────────────────

/// One device's state as recorded at the end of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSample {
    pub timestamp: DateTime<Utc>,
    pub is_online: bool,
    pub response_time_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_through_str() {
        for src in Source::ALL {
            assert_eq!(src.as_str().parse::<Source>().unwrap(), src);
        }
        assert_eq!("NMAP".parse::<Source>().unwrap(), Source::Nmap);
        assert!("freebox".parse::<Source>().is_err());
    }

    #[test]
    fn test_scan_kind_ordering() {
        assert!(ScanKind::Active < ScanKind::Passive);
        assert!(ScanKind::Passive < ScanKind::Resolved);
        assert_eq!(Source::Arp.scan_kind(), ScanKind::Passive);
        assert_eq!(Source::Vpn.scan_kind(), ScanKind::Overlay);
    }

    #[test]
    fn test_observation_builder_drops_blank_fields() {
        let obs = Observation::new(Source::Mdns)
            .with_mac("  ")
            .with_hostname("TITO.local");
        assert_eq!(obs.mac, None);
        assert_eq!(obs.hostname.as_deref(), Some("TITO.local"));
        assert_eq!(obs.scan_kind, ScanKind::Resolved);
        assert!(obs.is_online);
    }

    #[test]
    fn test_observation_wire_format() {
        let json = r#"{
            "source": "arp",
            "mac": "3c:22:fb:aa:bb:cc",
            "ip": "192.168.1.10",
            "is_online": true,
            "timestamp": "2026-01-01T00:00:00Z",
            "scan_kind": "passive"
        }"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.source, Source::Arp);
        assert_eq!(obs.hostname, None);
        assert_eq!(obs.response_time_ms, None);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(Severity::from_score(0.9), Severity::High);
        assert_eq!(Severity::from_score(0.5), Severity::Medium);
        assert_eq!(Severity::from_score(0.1), Severity::Low);
    }

    #[test]
    fn test_dhcp_dynamic() {
        let now = Utc::now();
        let mut record = DeviceRecord::new("3C:22:FB:AA:BB:CC", now);
        record.ip_history.push(HistoryEntry::new("192.168.1.10", now));
        assert!(!record.is_dhcp_dynamic());
        record.ip_history.push(HistoryEntry::new("192.168.1.15", now));
        assert!(record.is_dhcp_dynamic());
    }
}
