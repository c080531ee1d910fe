//! Confidence scoring for fused device views.
//!
//! Formula: `score = w_s × sources + w_f × freshness + w_c × completeness`
//!
//! - `sources = min(n / saturation, 1)` over distinct contributing sources
//! - `freshness = exp(-age / tau)` of the most recent observation
//! - `completeness` = fraction of {hostname, vendor, non-default OS} present
//!
//! With the defaults a device confirmed by three fresh sources scores at
//! least 0.8 regardless of completeness, and a single observation older
//! than an hour scores at most 0.39.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lanwatch_core::{DataQuality, FusedDevice, Observation, Source};

use crate::resolution::{Field, Specificity};

/// Weights and decay parameters for confidence scoring.
#[derive(Debug, Clone)]
pub struct ConfidenceConfig {
    pub source_weight: f64,
    pub freshness_weight: f64,
    pub completeness_weight: f64,
    /// Number of independent sources at which the source term saturates.
    pub saturation_sources: usize,
    /// Freshness decay constant in seconds.
    pub freshness_tau_secs: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            source_weight: 0.4,
            freshness_weight: 0.4,
            completeness_weight: 0.2,
            saturation_sources: 3,
            freshness_tau_secs: 1800.0,
        }
    }
}

impl ConfidenceConfig {
    /// Score a fused view in `[0.0, 1.0]`.
    pub fn score(
        &self,
        device: &FusedDevice,
        observations: &[Observation],
        now: DateTime<Utc>,
    ) -> f64 {
        let sources = distinct_sources(device, observations);
        if sources.is_empty() {
            return 0.0;
        }

        let source_term =
            (sources.len() as f64 / self.saturation_sources.max(1) as f64).min(1.0);

        let newest = observations
            .iter()
            .map(|o| o.timestamp)
            .max()
            .unwrap_or(device.last_observed);
        let age_secs = (now - newest).num_milliseconds().max(0) as f64 / 1000.0;
        let freshness_term = (-age_secs / self.freshness_tau_secs.max(1.0)).exp();

        let raw = self.source_weight * source_term
            + self.freshness_weight * freshness_term
            + self.completeness_weight * completeness(device);

        raw.clamp(0.0, 1.0)
    }
}

/// Score with the default configuration.
pub fn calculate_confidence(
    device: &FusedDevice,
    observations: &[Observation],
    now: DateTime<Utc>,
) -> f64 {
    ConfidenceConfig::default().score(device, observations, now)
}

/// Fraction of descriptive fields that carry real information.
pub fn completeness(device: &FusedDevice) -> f64 {
    let hostname = device.hostname.is_some() as u8;
    let vendor = device.vendor.is_some() as u8;
    let os = device
        .os_guess
        .as_deref()
        .is_some_and(|os| Specificity::of(Field::OsGuess, os) > Specificity::Placeholder)
        as u8;
    f64::from(hostname + vendor + os) / 3.0
}

/// Grade a view from its independent source count and completeness.
pub fn data_quality(source_count: usize, completeness: f64) -> DataQuality {
    if source_count >= 3 && completeness >= 2.0 / 3.0 {
        DataQuality::High
    } else if source_count >= 2 || completeness >= 2.0 / 3.0 {
        DataQuality::Medium
    } else {
        DataQuality::Low
    }
}

fn distinct_sources(device: &FusedDevice, observations: &[Observation]) -> BTreeSet<Source> {
    if observations.is_empty() {
        device.sources.clone()
    } else {
        observations.iter().map(|o| o.source).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn device(sources: &[Source], now: DateTime<Utc>) -> FusedDevice {
        FusedDevice {
            mac: "3C:22:FB:AA:BB:CC".to_string(),
            ip: Some("192.168.1.10".to_string()),
            alternate_ips: vec![],
            hostname: None,
            vendor: None,
            os_guess: None,
            is_online: true,
            response_time_ms: None,
            is_vpn_connected: false,
            vpn_ip: None,
            sources: sources.iter().copied().collect(),
            confidence_score: 0.0,
            data_quality: DataQuality::Low,
            last_observed: now,
        }
    }

    #[test]
    fn test_single_stale_arp_below_threshold() {
        let now = Utc::now();
        let seen = now - TimeDelta::hours(2);
        let obs = vec![Observation::new(Source::Arp)
            .with_mac("3c:22:fb:aa:bb:cc")
            .with_ip("192.168.1.10")
            .with_vendor("Apple Inc.")
            .with_timestamp(seen)];
        let mut dev = device(&[Source::Arp], seen);
        dev.vendor = Some("Apple Inc.".to_string());

        let score = calculate_confidence(&dev, &obs, now);
        assert!(score < 0.7, "score was {score}");
    }

    #[test]
    fn test_single_hour_old_observation_below_threshold_even_when_complete() {
        let now = Utc::now();
        let seen = now - TimeDelta::minutes(61);
        let obs = vec![Observation::new(Source::Nmap).with_timestamp(seen)];
        let mut dev = device(&[Source::Nmap], seen);
        dev.hostname = Some("tito".to_string());
        dev.vendor = Some("Apple".to_string());
        dev.os_guess = Some("macOS 14".to_string());

        assert!(calculate_confidence(&dev, &obs, now) < 0.7);
    }

    #[test]
    fn test_three_fresh_sources_above_threshold() {
        let now = Utc::now();
        let obs = vec![
            Observation::new(Source::Nmap).with_timestamp(now),
            Observation::new(Source::Mdns).with_timestamp(now),
            Observation::new(Source::Dhcp).with_timestamp(now),
        ];
        let dev = device(&[Source::Nmap, Source::Mdns, Source::Dhcp], now);

        let score = calculate_confidence(&dev, &obs, now);
        assert!(score > 0.7, "score was {score}");
        assert!(score <= 1.0);
    }

    #[test]
    fn test_more_sources_raise_confidence() {
        let now = Utc::now();
        let one = vec![Observation::new(Source::Arp).with_timestamp(now)];
        let two = vec![
            Observation::new(Source::Arp).with_timestamp(now),
            Observation::new(Source::Ping).with_timestamp(now),
        ];
        let a = calculate_confidence(&device(&[Source::Arp], now), &one, now);
        let b = calculate_confidence(&device(&[Source::Arp, Source::Ping], now), &two, now);
        assert!(b > a);
    }

    #[test]
    fn test_default_os_does_not_count_as_complete() {
        let now = Utc::now();
        let mut dev = device(&[Source::Nmap], now);
        dev.os_guess = Some("Unknown".to_string());
        assert!((completeness(&dev) - 0.0).abs() < f64::EPSILON);
        dev.hostname = Some("tito".to_string());
        assert!((completeness(&dev) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_data_quality_grades() {
        assert_eq!(data_quality(3, 1.0), DataQuality::High);
        assert_eq!(data_quality(2, 0.0), DataQuality::Medium);
        assert_eq!(data_quality(1, 0.0), DataQuality::Low);
    }
}
