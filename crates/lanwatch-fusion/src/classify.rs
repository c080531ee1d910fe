//! Device-type and OS classification from string patterns.

use lanwatch_core::DeviceRecord;
use serde::{Deserialize, Serialize};

/// Result of classifying one record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub device_type: Option<String>,
    pub os_guess: Option<String>,
    /// Added to the record's confidence score (clamped by the caller).
    pub confidence_contribution: f64,
}

/// A swappable device classification strategy.
pub trait Classifier: Send + Sync {
    fn classify(&self, record: &DeviceRecord) -> Classification;
}

/// Where a pattern is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Hostname,
    Vendor,
    Os,
}

struct Rule {
    target: Target,
    needle: &'static str,
    device_type: &'static str,
    os: Option<&'static str>,
}

const fn rule(
    target: Target,
    needle: &'static str,
    device_type: &'static str,
    os: Option<&'static str>,
) -> Rule {
    Rule {
        target,
        needle,
        device_type,
        os,
    }
}

// First match wins. Hostname rules come first.
const RULES: &[Rule] = &[
    rule(Target::Hostname, "iphone", "phone", Some("iOS")),
    rule(Target::Hostname, "ipad", "tablet", Some("iPadOS")),
    rule(Target::Hostname, "android", "phone", Some("Android")),
    rule(Target::Hostname, "galaxy", "phone", Some("Android")),
    rule(Target::Hostname, "pixel", "phone", Some("Android")),
    rule(Target::Hostname, "macbook", "laptop", Some("macOS")),
    rule(Target::Hostname, "-mbp", "laptop", Some("macOS")),
    rule(Target::Hostname, "imac", "desktop", Some("macOS")),
    rule(Target::Hostname, "desktop-", "desktop", Some("Windows")),
    rule(Target::Hostname, "laptop-", "laptop", Some("Windows")),
    rule(Target::Hostname, "appletv", "media", Some("tvOS")),
    rule(Target::Hostname, "chromecast", "media", None),
    rule(Target::Hostname, "roku", "media", None),
    rule(Target::Hostname, "printer", "printer", None),
    rule(Target::Hostname, "diskstation", "storage", Some("Linux")),
    rule(Target::Hostname, "raspberrypi", "server", Some("Linux")),
    rule(Target::Hostname, "router", "router", None),
    rule(Target::Hostname, "gateway", "router", None),
    rule(Target::Vendor, "raspberry pi", "server", Some("Linux")),
    rule(Target::Vendor, "synology", "storage", Some("Linux")),
    rule(Target::Vendor, "qnap", "storage", Some("Linux")),
    rule(Target::Vendor, "ubiquiti", "router", None),
    rule(Target::Vendor, "netgear", "router", None),
    rule(Target::Vendor, "tp-link", "router", None),
    rule(Target::Vendor, "mikrotik", "router", None),
    rule(Target::Vendor, "freebox", "router", None),
    rule(Target::Vendor, "sagemcom", "router", None),
    rule(Target::Vendor, "hewlett packard", "printer", None),
    rule(Target::Vendor, "brother", "printer", None),
    rule(Target::Vendor, "epson", "printer", None),
    rule(Target::Vendor, "sonos", "media", None),
    rule(Target::Vendor, "espressif", "iot", None),
    rule(Target::Vendor, "tuya", "iot", None),
    rule(Target::Vendor, "nest", "iot", None),
    rule(Target::Vendor, "apple", "apple device", None),
    rule(Target::Vendor, "samsung", "phone", Some("Android")),
    rule(Target::Vendor, "intel", "computer", None),
    rule(Target::Os, "ios", "phone", None),
    rule(Target::Os, "android", "phone", None),
    rule(Target::Os, "windows", "computer", None),
    rule(Target::Os, "mac os", "computer", None),
    rule(Target::Os, "macos", "computer", None),
    rule(Target::Os, "routeros", "router", None),
    rule(Target::Os, "linux", "computer", None),
];

/// Pattern-table classifier over hostname, vendor, and detected OS.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    /// Contribution for a hostname match.
    pub strong_contribution: f64,
    /// Contribution for a vendor or OS match.
    pub weak_contribution: f64,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self {
            strong_contribution: 0.05,
            weak_contribution: 0.02,
        }
    }
}

impl Classifier for PatternClassifier {
    fn classify(&self, record: &DeviceRecord) -> Classification {
        let hostname = record.current_hostname.as_deref().map(str::to_lowercase);
        let vendor = record.vendor.as_deref().map(str::to_lowercase);
        let os = record.os_detected.as_deref().map(str::to_lowercase);

        let matched = RULES.iter().find(|r| {
            let haystack = match r.target {
                Target::Hostname => hostname.as_deref(),
                Target::Vendor => vendor.as_deref(),
                Target::Os => os.as_deref(),
            };
            haystack.is_some_and(|h| h.contains(r.needle))
        });

        let Some(rule) = matched else {
            return Classification::default();
        };

        let contribution = if rule.target == Target::Hostname {
            self.strong_contribution
        } else {
            self.weak_contribution
        };

        Classification {
            device_type: Some(rule.device_type.to_string()),
            // A detected OS always beats a guess from the name.
            os_guess: record
                .os_detected
                .clone()
                .or_else(|| rule.os.map(str::to_string)),
            confidence_contribution: contribution,
        }
    }
}
