//! Merge an observation group into one fused device view.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lanwatch_core::{normalize_mac, FusedDevice, Observation, ScanKind};

use crate::confidence::{self, ConfidenceConfig};
use crate::resolution::{Field, FieldResolution};

/// The fusion engine: a field-resolution table plus a confidence model.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    pub resolution: FieldResolution,
    pub confidence: ConfidenceConfig,
}

impl FusionEngine {
    pub fn new(resolution: FieldResolution, confidence: ConfidenceConfig) -> Self {
        Self {
            resolution,
            confidence,
        }
    }

    /// Fuse observations of one device.
    ///
    /// The identity is the first observation carrying a valid MAC; groups
    /// with no valid MAC yield `None`. Overlay observations contribute the
    /// VPN state and overlay address but never the LAN `ip`.
    pub fn merge(&self, observations: &[Observation], now: DateTime<Utc>) -> Option<FusedDevice> {
        let mac = observations
            .iter()
            .filter_map(|o| o.mac.as_deref())
            .find_map(|m| normalize_mac(m).ok())?;

        let (overlay, lan): (Vec<&Observation>, Vec<&Observation>) = observations
            .iter()
            .partition(|o| o.scan_kind == ScanKind::Overlay);

        let ip = self
            .resolution
            .resolve(Field::Ip, lan.iter().copied())
            .map(|(v, _)| v);

        // Only sightings that carry this MAC can show a second address.
        let mut alternate_ips: Vec<String> = lan
            .iter()
            .filter(|o| o.is_online)
            .filter(|o| {
                o.mac
                    .as_deref()
                    .and_then(|m| normalize_mac(m).ok())
                    .is_some_and(|m| m == mac)
            })
            .filter_map(|o| o.ip.as_deref())
            .filter(|candidate| Some(*candidate) != ip.as_deref())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        alternate_ips.retain(|a| a.parse::<std::net::IpAddr>().is_ok());

        let hostname = self
            .resolution
            .resolve(Field::Hostname, observations)
            .map(|(v, _)| v);
        let vendor = self
            .resolution
            .resolve(Field::Vendor, observations)
            .map(|(v, _)| v);
        let os_guess = self
            .resolution
            .resolve(Field::OsGuess, observations)
            .map(|(v, _)| v);

        let response_time_ms = observations
            .iter()
            .filter_map(|o| o.response_time_ms)
            .filter(|ms| *ms > 0.0)
            .min_by(|a, b| a.total_cmp(b));

        let vpn_ip = self
            .resolution
            .resolve(Field::Ip, overlay.iter().copied())
            .map(|(v, _)| v);

        let mut device = FusedDevice {
            mac,
            ip,
            alternate_ips,
            hostname,
            vendor,
            os_guess,
            is_online: observations.iter().any(|o| o.is_online),
            response_time_ms,
            is_vpn_connected: overlay.iter().any(|o| o.is_online),
            vpn_ip,
            sources: observations.iter().map(|o| o.source).collect(),
            confidence_score: 0.0,
            data_quality: Default::default(),
            last_observed: observations
                .iter()
                .map(|o| o.timestamp)
                .max()
                .unwrap_or(now),
        };

        device.confidence_score = self.confidence.score(&device, observations, now);
        device.data_quality =
            confidence::data_quality(device.sources.len(), confidence::completeness(&device));

        tracing::trace!(
            mac = %device.mac,
            sources = device.sources.len(),
            confidence = device.confidence_score,
            "Fused observation group"
        );

        Some(device)
    }
}
