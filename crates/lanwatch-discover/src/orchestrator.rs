//! Scan orchestration.
//!
//! Runs every enabled source against a subnet one after another, groups
//! what they saw by MAC, and fuses each group into one device view. Only
//! one orchestration runs at a time; a second caller gets
//! [`DiscoverError::ScanInProgress`] immediately.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ipnet::IpNet;
use lanwatch_core::{normalize_mac, ConflictRecord, FusedDevice, Observation, ScanKind, Source};
use lanwatch_fusion::{detect_conflicts, Field, FusionEngine, Specificity};
use lanwatch_journal::{SourceReport, SourceStatus};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};
use crate::sources::{self, SourceOutcome, SourceScanner};

/// Everything one orchestrated scan produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub subnet: String,
    pub fused: Vec<FusedDevice>,
    pub conflicts: Vec<ConflictRecord>,
    pub stats: ScanStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub sources: Vec<SourceReport>,
    pub observation_count: usize,
    /// MAC-less observations that matched no device.
    pub uncorrelated: usize,
    pub duration_ms: u64,
}

pub struct ScanOrchestrator {
    sources: Vec<Arc<dyn SourceScanner>>,
    fusion: FusionEngine,
    inter_source_delay: Duration,
    running: AtomicBool,
    unavailable: Mutex<HashSet<Source>>,
}

/// Clears the running flag when the scan ends, however it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DiscoverError::ScanInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScanOrchestrator {
    pub fn new(sources: Vec<Arc<dyn SourceScanner>>, fusion: FusionEngine) -> Self {
        Self {
            sources,
            fusion,
            inter_source_delay: Duration::ZERO,
            running: AtomicBool::new(false),
            unavailable: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &DiscoverConfig) -> Self {
        Self::new(
            sources::build_sources(&config.sources),
            FusionEngine::default(),
        )
        .with_inter_source_delay(Duration::from_millis(config.inter_source_delay_ms))
    }

    pub fn with_inter_source_delay(mut self, delay: Duration) -> Self {
        self.inter_source_delay = delay;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run all sources against `subnet` and fuse the result.
    pub async fn scan_all(&self, subnet: &IpNet) -> Result<ScanReport> {
        let _guard = ScanGuard::acquire(&self.running)?;
        let start = Instant::now();

        tracing::info!(subnet = %subnet, sources = self.sources.len(), "Starting orchestrated scan");

        let mut observations = Vec::new();
        let mut reports = Vec::with_capacity(self.sources.len());
        let mut attempted = false;

        for scanner in &self.sources {
            let source = scanner.source();
            if self.unavailable.lock().await.contains(&source) {
                reports.push(report(source, SourceStatus::Skipped, 0, Duration::ZERO, None));
                continue;
            }

            if attempted && !self.inter_source_delay.is_zero() {
                tokio::time::sleep(self.inter_source_delay).await;
            }
            attempted = true;

            let (status, found, detail, elapsed) = self.run_source(scanner.as_ref(), subnet).await;
            reports.push(report(source, status, found.len(), elapsed, detail));
            observations.extend(found);
        }

        let observation_count = observations.len();
        let now = Utc::now();
        let (groups, uncorrelated) = correlate(observations);
        let fused: Vec<FusedDevice> = groups
            .iter()
            .filter_map(|group| self.fusion.merge(group, now))
            .collect();
        let conflicts = detect_conflicts(&fused, now);

        let stats = ScanStats {
            sources: reports,
            observation_count,
            uncorrelated,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            subnet = %subnet,
            devices = fused.len(),
            observations = observation_count,
            uncorrelated,
            conflicts = conflicts.len(),
            duration_ms = stats.duration_ms,
            "Orchestrated scan complete"
        );

        Ok(ScanReport {
            subnet: subnet.to_string(),
            fused,
            conflicts,
            stats,
        })
    }

    async fn run_source(
        &self,
        scanner: &dyn SourceScanner,
        subnet: &IpNet,
    ) -> (SourceStatus, Vec<Observation>, Option<String>, Duration) {
        let source = scanner.source();
        let limit = scanner.timeout();
        let start = Instant::now();
        let result = tokio::time::timeout(limit, scanner.scan(subnet)).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(SourceOutcome::Observed(found))) => {
                tracing::debug!(source = %source, count = found.len(), "Source reported");
                (SourceStatus::Ok, found, None, elapsed)
            }
            Ok(Ok(SourceOutcome::Unavailable { tool })) => {
                tracing::warn!(source = %source, tool = %tool, "Source unavailable, skipping until restart");
                self.unavailable.lock().await.insert(source);
                (SourceStatus::Unavailable, Vec::new(), Some(tool), elapsed)
            }
            Ok(Err(e)) => {
                tracing::warn!(source = %source, error = %e, "Source failed");
                (SourceStatus::Failed, Vec::new(), Some(e.to_string()), elapsed)
            }
            Err(_) => {
                let e = DiscoverError::SourceTimeout {
                    scanner: source,
                    timeout_ms: limit.as_millis() as u64,
                };
                tracing::warn!(source = %source, error = %e, "Source timed out");
                (SourceStatus::TimedOut, Vec::new(), Some(e.to_string()), elapsed)
            }
        }
    }
}

fn report(
    source: Source,
    status: SourceStatus,
    observation_count: usize,
    elapsed: Duration,
    detail: Option<String>,
) -> SourceReport {
    SourceReport {
        source,
        status,
        observation_count,
        duration_ms: elapsed.as_millis() as u64,
        detail,
    }
}

/// Group observations by normalized MAC.
///
/// Observations without a usable MAC are attached to an existing group:
/// overlay observations by hostname, then IP; everything else by IP, then
/// hostname. Returns the groups in MAC order and the number of MAC-less
/// observations that matched nothing.
pub fn correlate(observations: Vec<Observation>) -> (Vec<Vec<Observation>>, usize) {
    let mut groups: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    let mut orphans = Vec::new();

    for obs in observations {
        match obs.mac.as_deref().map(normalize_mac) {
            Some(Ok(mac)) => groups.entry(mac).or_default().push(obs),
            _ => orphans.push(obs),
        }
    }

    let mut by_ip: HashMap<String, String> = HashMap::new();
    let mut by_host: HashMap<String, String> = HashMap::new();
    for (mac, group) in &groups {
        for obs in group {
            if obs.scan_kind != ScanKind::Overlay {
                if let Some(ip) = obs.ip.as_deref() {
                    by_ip.entry(ip.to_string()).or_insert_with(|| mac.clone());
                }
            }
            if let Some(key) = obs.hostname.as_deref().and_then(hostname_key) {
                by_host.entry(key).or_insert_with(|| mac.clone());
            }
        }
    }

    let mut uncorrelated = 0;
    for mut obs in orphans {
        let ip_match = obs
            .ip
            .as_deref()
            .and_then(|ip| by_ip.get(ip))
            .cloned();
        let host_match = obs
            .hostname
            .as_deref()
            .and_then(hostname_key)
            .and_then(|key| by_host.get(&key))
            .cloned();
        let matched = match (obs.scan_kind, ip_match, host_match) {
            (ScanKind::Overlay, ip, host) => host.or(ip),
            (_, Some(mac), _) => Some(mac),
            (_, None, Some(mac)) => {
                // A LAN address that never answered for this MAC is not
                // evidence of a second address.
                obs.ip = None;
                Some(mac)
            }
            (_, None, None) => None,
        };

        match matched.and_then(|mac| groups.get_mut(&mac)) {
            Some(group) => group.push(obs),
            None => {
                tracing::debug!(
                    source = %obs.source,
                    ip = ?obs.ip,
                    hostname = ?obs.hostname,
                    "Dropping uncorrelated observation"
                );
                uncorrelated += 1;
            }
        }
    }

    (groups.into_values().collect(), uncorrelated)
}

/// `TITO.local` and `tito` compare equal. Placeholder names never match.
fn hostname_key(hostname: &str) -> Option<String> {
    if Specificity::of(Field::Hostname, hostname) == Specificity::Placeholder {
        return None;
    }
    let short = hostname.trim().split('.').next().unwrap_or_default();
    (!short.is_empty()).then(|| short.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const MAC: &str = "3c:22:fb:aa:bb:cc";

    enum Behavior {
        Observe(Vec<Observation>),
        Unavailable,
        Fail,
        Sleep(Duration),
    }

    struct FakeScanner {
        source: Source,
        behavior: Behavior,
        timeout: Duration,
        calls: AtomicUsize,
    }

    impl FakeScanner {
        fn new(source: Source, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                source,
                behavior,
                timeout: Duration::from_secs(5),
                calls: AtomicUsize::new(0),
            })
        }

        fn with_timeout(source: Source, behavior: Behavior, timeout: Duration) -> Arc<Self> {
            Arc::new(Self {
                source,
                behavior,
                timeout,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SourceScanner for FakeScanner {
        fn source(&self) -> Source {
            self.source
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn scan(&self, _subnet: &IpNet) -> Result<SourceOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Observe(obs) => Ok(SourceOutcome::Observed(obs.clone())),
                Behavior::Unavailable => Ok(SourceOutcome::Unavailable {
                    tool: "fake".to_string(),
                }),
                Behavior::Fail => Err(DiscoverError::ToolFailed {
                    tool: "fake".to_string(),
                    code: 1,
                    stderr: "boom".to_string(),
                }),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(SourceOutcome::Observed(Vec::new()))
                }
            }
        }
    }

    fn subnet() -> IpNet {
        "192.168.1.0/24".parse().unwrap()
    }

    fn arp(mac: &str, ip: &str) -> Observation {
        Observation::new(Source::Arp).with_mac(mac).with_ip(ip)
    }

    #[tokio::test]
    async fn test_failing_sources_do_not_abort() {
        let orchestrator = ScanOrchestrator::new(
            vec![
                FakeScanner::new(Source::Nmap, Behavior::Fail),
                FakeScanner::with_timeout(
                    Source::Ping,
                    Behavior::Sleep(Duration::from_secs(10)),
                    Duration::from_millis(50),
                ),
                FakeScanner::new(Source::Arp, Behavior::Observe(vec![arp(MAC, "192.168.1.10")])),
            ],
            FusionEngine::default(),
        );

        let report = orchestrator.scan_all(&subnet()).await.unwrap();
        assert_eq!(report.fused.len(), 1);
        assert_eq!(report.fused[0].mac, "3C:22:FB:AA:BB:CC");

        let statuses: Vec<SourceStatus> = report.stats.sources.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![SourceStatus::Failed, SourceStatus::TimedOut, SourceStatus::Ok]
        );
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_unavailable_source_skipped_next_time() {
        let missing = FakeScanner::new(Source::Mdns, Behavior::Unavailable);
        let orchestrator = ScanOrchestrator::new(vec![missing.clone()], FusionEngine::default());

        let first = orchestrator.scan_all(&subnet()).await.unwrap();
        assert_eq!(first.stats.sources[0].status, SourceStatus::Unavailable);

        let second = orchestrator.scan_all(&subnet()).await.unwrap();
        assert_eq!(second.stats.sources[0].status, SourceStatus::Skipped);
        assert_eq!(missing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_scan_rejected() {
        let orchestrator = Arc::new(ScanOrchestrator::new(
            vec![FakeScanner::new(
                Source::Nmap,
                Behavior::Sleep(Duration::from_millis(300)),
            )],
            FusionEngine::default(),
        ));

        let background = orchestrator.clone();
        let first = tokio::spawn(async move { background.scan_all(&subnet()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = orchestrator.scan_all(&subnet()).await;
        assert!(matches!(second, Err(DiscoverError::ScanInProgress)));

        assert!(first.await.unwrap().is_ok());
        assert!(orchestrator.scan_all(&subnet()).await.is_ok());
    }

    #[tokio::test]
    async fn test_conflicts_reported() {
        let orchestrator = ScanOrchestrator::new(
            vec![FakeScanner::new(
                Source::Arp,
                Behavior::Observe(vec![
                    arp("aa:aa:aa:aa:aa:01", "192.168.1.50"),
                    arp("aa:aa:aa:aa:aa:02", "192.168.1.50"),
                ]),
            )],
            FusionEngine::default(),
        );
        let report = orchestrator.scan_all(&subnet()).await.unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].affected_macs.len(), 2);
    }

    #[test]
    fn test_correlate_by_ip_and_hostname() {
        let observations = vec![
            Observation::new(Source::Nmap)
                .with_mac(MAC)
                .with_ip("192.168.1.10")
                .with_hostname("TITO"),
            arp("3C-22-FB-AA-BB-CC", "192.168.1.10"),
            Observation::new(Source::Ping)
                .with_ip("192.168.1.10")
                .with_response_time(2.5),
            Observation::new(Source::Mdns)
                .with_ip("192.168.1.99")
                .with_hostname("tito.local"),
            Observation::new(Source::Vpn)
                .with_ip("100.101.102.2")
                .with_hostname("TITO"),
            Observation::new(Source::Ping).with_ip("192.168.1.200"),
        ];

        let (groups, uncorrelated) = correlate(observations);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 5);
        assert_eq!(uncorrelated, 1);

        let fused = FusionEngine::default().merge(&groups[0], Utc::now()).unwrap();
        assert_eq!(fused.ip.as_deref(), Some("192.168.1.10"));
        assert!(fused.is_vpn_connected);
        assert_eq!(fused.vpn_ip.as_deref(), Some("100.101.102.2"));
        assert_eq!(fused.response_time_ms, Some(2.5));
        assert!(fused.alternate_ips.is_empty());
    }

    #[test]
    fn test_hostname_match_does_not_report_duplicate_mac() {
        let observations = vec![
            Observation::new(Source::Nmap)
                .with_mac(MAC)
                .with_ip("192.168.1.10")
                .with_hostname("TITO"),
            Observation::new(Source::Mdns)
                .with_ip("192.168.1.99")
                .with_hostname("tito.local"),
        ];

        let (groups, uncorrelated) = correlate(observations);
        assert_eq!(uncorrelated, 0);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][1].ip, None);

        let now = Utc::now();
        let fused = FusionEngine::default().merge(&groups[0], now).unwrap();
        assert_eq!(fused.ip.as_deref(), Some("192.168.1.10"));
        assert!(fused.alternate_ips.is_empty());
        assert!(detect_conflicts(&[fused], now).is_empty());
    }

    #[test]
    fn test_overlay_prefers_hostname_over_ip() {
        let observations = vec![
            arp("aa:aa:aa:aa:aa:01", "100.101.102.9"),
            Observation::new(Source::Nmap)
                .with_mac("aa:aa:aa:aa:aa:02")
                .with_ip("192.168.1.20")
                .with_hostname("homelab"),
            Observation::new(Source::Vpn)
                .with_ip("100.101.102.9")
                .with_hostname("homelab.tailnet.ts.net"),
        ];

        let (groups, uncorrelated) = correlate(observations);
        assert_eq!(uncorrelated, 0);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[1][1].source, Source::Vpn);
    }

    #[test]
    fn test_placeholder_hostnames_never_match() {
        assert_eq!(hostname_key("192.168.1.10"), None);
        assert_eq!(hostname_key("unknown"), None);
        assert_eq!(hostname_key("TITO.local").as_deref(), Some("tito"));
    }
}
