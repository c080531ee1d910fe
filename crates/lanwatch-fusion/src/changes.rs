//! Change detection between a previous device view and a fresh fused view.

use chrono::{DateTime, Utc};
use lanwatch_core::{ChangeEvent, ChangeType, DeviceRecord, FusedDevice};

/// The comparable subset of a device, built from either a stored record or
/// a fused view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceView {
    pub mac: String,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub is_online: bool,
}

impl From<&DeviceRecord> for DeviceView {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            mac: record.mac.clone(),
            ip: record.current_ip.clone(),
            hostname: record.current_hostname.clone(),
            is_online: record.is_online,
        }
    }
}

impl From<&FusedDevice> for DeviceView {
    fn from(device: &FusedDevice) -> Self {
        Self {
            mac: device.mac.clone(),
            ip: device.ip.clone(),
            hostname: device.hostname.clone(),
            is_online: device.is_online,
        }
    }
}

/// Compare `previous` against `current`.
///
/// No previous view yields exactly one `NEW_DEVICE`. Otherwise ip, hostname,
/// and the online flag are compared independently and each difference
/// yields one event. A field the current scan did not report is not a
/// change.
pub fn detect_changes(
    previous: Option<&DeviceView>,
    current: &FusedDevice,
    now: DateTime<Utc>,
) -> Vec<ChangeEvent> {
    let confidence = current.confidence_score;
    let event = |change_type, old: Option<&String>, new: Option<&String>| {
        ChangeEvent::new(
            &current.mac,
            change_type,
            old.cloned(),
            new.cloned(),
            confidence,
            now,
        )
    };

    let Some(prev) = previous else {
        return vec![event(ChangeType::NewDevice, None, current.ip.as_ref())];
    };

    let mut events = Vec::new();

    if let Some(ip) = &current.ip {
        if prev.ip.as_ref() != Some(ip) {
            events.push(event(ChangeType::IpChanged, prev.ip.as_ref(), Some(ip)));
        }
    }

    if let Some(hostname) = &current.hostname {
        if prev.hostname.as_ref() != Some(hostname) {
            events.push(event(
                ChangeType::HostnameChanged,
                prev.hostname.as_ref(),
                Some(hostname),
            ));
        }
    }

    if prev.is_online != current.is_online {
        let change_type = if current.is_online {
            ChangeType::DeviceOnline
        } else {
            ChangeType::DeviceOffline
        };
        let (old, new) = (prev.is_online.to_string(), current.is_online.to_string());
        events.push(event(change_type, Some(&old), Some(&new)));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanwatch_core::DataQuality;

    fn fused(ip: &str, hostname: Option<&str>, online: bool) -> FusedDevice {
        FusedDevice {
            mac: "3C:22:FB:AA:BB:CC".to_string(),
            ip: Some(ip.to_string()),
            alternate_ips: vec![],
            hostname: hostname.map(String::from),
            vendor: None,
            os_guess: None,
            is_online: online,
            response_time_ms: None,
            is_vpn_connected: false,
            vpn_ip: None,
            sources: Default::default(),
            confidence_score: 0.82,
            data_quality: DataQuality::Medium,
            last_observed: Utc::now(),
        }
    }

    #[test]
    fn test_new_device_single_event() {
        let current = fused("192.168.1.10", Some("tito"), true);
        let events = detect_changes(None, &current, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, ChangeType::NewDevice);
        assert_eq!(events[0].new_value.as_deref(), Some("192.168.1.10"));
    }

    #[test]
    fn test_ip_change_only() {
        let previous = DeviceView::from(&fused("192.168.1.10", Some("tito"), true));
        let current = fused("192.168.1.15", Some("tito"), true);

        let events = detect_changes(Some(&previous), &current, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, ChangeType::IpChanged);
        assert_eq!(events[0].old_value.as_deref(), Some("192.168.1.10"));
        assert_eq!(events[0].new_value.as_deref(), Some("192.168.1.15"));
        assert!((events[0].confidence - 0.82).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unchanged_yields_nothing() {
        let current = fused("192.168.1.10", Some("tito"), true);
        let previous = DeviceView::from(&current);
        assert!(detect_changes(Some(&previous), &current, Utc::now()).is_empty());
    }

    #[test]
    fn test_independent_fields() {
        let previous = DeviceView::from(&fused("192.168.1.10", Some("tito"), false));
        let current = fused("192.168.1.11", Some("tito-mbp"), true);

        let kinds: Vec<ChangeType> = detect_changes(Some(&previous), &current, Utc::now())
            .into_iter()
            .map(|e| e.change_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ChangeType::IpChanged,
                ChangeType::HostnameChanged,
                ChangeType::DeviceOnline
            ]
        );
    }

    #[test]
    fn test_missing_hostname_is_not_a_change() {
        let previous = DeviceView::from(&fused("192.168.1.10", Some("tito"), true));
        let current = fused("192.168.1.10", None, true);
        assert!(detect_changes(Some(&previous), &current, Utc::now()).is_empty());
    }
}
