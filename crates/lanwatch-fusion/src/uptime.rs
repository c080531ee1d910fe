//! Availability statistics from a device's scan history.

use chrono::{DateTime, Utc};
use lanwatch_core::ScanSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UptimeStats {
    pub total_scans: usize,
    pub total_detections: usize,
    pub detection_rate: f64,
    /// Share of observed wall-clock time spent online, in percent.
    pub uptime_percentage: f64,
    pub average_latency_ms: Option<f64>,
}

/// Derive availability metrics from one device's scan samples.
///
/// Each sample's state holds until the next sample. The final sample is
/// weighted by the mean spacing of the history. When every sample shares
/// one timestamp the uptime falls back to the detection rate.
pub fn calculate_uptime(history: &[ScanSample]) -> UptimeStats {
    if history.is_empty() {
        return UptimeStats::default();
    }

    let mut samples: Vec<&ScanSample> = history.iter().collect();
    samples.sort_by_key(|s| s.timestamp);

    let total_scans = samples.len();
    let total_detections = samples.iter().filter(|s| s.is_online).count();
    let detection_rate = total_detections as f64 / total_scans as f64;

    let latencies: Vec<f64> = samples
        .iter()
        .filter(|s| s.is_online)
        .filter_map(|s| s.response_time_ms)
        .filter(|ms| *ms > 0.0)
        .collect();
    let average_latency_ms =
        (!latencies.is_empty()).then(|| latencies.iter().sum::<f64>() / latencies.len() as f64);

    UptimeStats {
        total_scans,
        total_detections,
        detection_rate,
        uptime_percentage: time_weighted(&samples).unwrap_or(detection_rate * 100.0),
        average_latency_ms,
    }
}

fn time_weighted(samples: &[&ScanSample]) -> Option<f64> {
    let (first, last) = (samples.first()?, samples.last()?);
    let span = seconds(first.timestamp, last.timestamp);
    if span <= 0.0 {
        return None;
    }
    let tail = span / (samples.len() - 1) as f64;

    let mut online = 0.0;
    let mut total = 0.0;
    for (i, sample) in samples.iter().enumerate() {
        let weight = match samples.get(i + 1) {
            Some(next) => seconds(sample.timestamp, next.timestamp),
            None => tail,
        };
        total += weight;
        if sample.is_online {
            online += weight;
        }
    }

    Some(online / total * 100.0)
}

fn seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}
