//! Scan pipeline and scheduling.
//!
//! Spawns one tokio task per configured subnet, each running periodic scans
//! at the configured interval. The orchestrator is single-flight, so a tick
//! that lands while another subnet is being scanned is skipped.

use std::sync::Arc;
use std::time::Instant;

use chrono::{TimeDelta, Utc};
use ipnet::IpNet;
use lanwatch_core::ConflictRecord;
use lanwatch_journal::{JournalStore, ScanId, SourceReport};
use lanwatch_registry::Registry;
use serde::Serialize;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::SubnetSchedule;
use crate::enrichment::VendorEnricher;
use crate::error::{DiscoverError, Result};
use crate::journal;
use crate::orchestrator::ScanOrchestrator;

/// What one pipeline run reports back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub scan_id: ScanId,
    pub subnet: String,
    pub devices_found: usize,
    pub new_devices: usize,
    pub changes: usize,
    pub duration_ms: u64,
    pub conflicts: Vec<ConflictRecord>,
    /// Set when the registry could not be written; the changes are held
    /// in memory and retried with the next write.
    pub persist_warning: Option<String>,
    pub sources: Vec<SourceReport>,
}

/// Execute a single scan: orchestrate → registry → journal → enrichment.
pub async fn run_single_scan(
    orchestrator: &ScanOrchestrator,
    registry: &Arc<Registry>,
    journal_store: &dyn JournalStore,
    enricher: Option<&Arc<VendorEnricher>>,
    subnet: &IpNet,
) -> Result<ScanResult> {
    let start = Instant::now();
    let report = orchestrator.scan_all(subnet).await?;
    let mut session = journal::start_scan_session(subnet);
    let scan_id = session.id();

    let outcome = registry.update_from_subnet_scan(subnet, &report.fused).await;
    if let Some(warning) = &outcome.persist_warning {
        tracing::warn!(scan_id = %scan_id, warning = %warning, "Registry not persisted");
    }

    let snapshot = registry.snapshot().await;
    journal::record_scan(&mut session, subnet, &report, &outcome, &snapshot);
    journal::finalize_and_store(session, journal_store);

    if let Some(enricher) = enricher {
        enricher.spawn();
    }

    let result = ScanResult {
        scan_id,
        subnet: subnet.to_string(),
        devices_found: report.fused.len(),
        new_devices: outcome.new,
        changes: outcome.changes.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        conflicts: report.conflicts,
        persist_warning: outcome.persist_warning,
        sources: report.stats.sources,
    };

    tracing::info!(
        scan_id = %result.scan_id,
        subnet = %subnet,
        devices = result.devices_found,
        new = result.new_devices,
        updated = outcome.updated,
        changes = result.changes,
        conflicts = result.conflicts.len(),
        duration_ms = result.duration_ms,
        "Scan complete"
    );

    Ok(result)
}

/// Periodic scans of every enabled subnet.
pub struct ScanScheduler {
    subnets: Vec<SubnetSchedule>,
    orchestrator: Arc<ScanOrchestrator>,
    registry: Arc<Registry>,
    journal: Arc<dyn JournalStore>,
    enricher: Option<Arc<VendorEnricher>>,
    retention_days: u32,
}

impl ScanScheduler {
    pub fn new(
        subnets: Vec<SubnetSchedule>,
        orchestrator: Arc<ScanOrchestrator>,
        registry: Arc<Registry>,
        journal: Arc<dyn JournalStore>,
        enricher: Option<Arc<VendorEnricher>>,
    ) -> Self {
        Self {
            subnets,
            orchestrator,
            registry,
            journal,
            enricher,
            retention_days: 0,
        }
    }

    /// Prune journal days older than `days` once a day. 0 disables pruning.
    pub fn with_journal_retention(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Run the scheduler, spawning a tokio task per subnet.
    /// Blocks until every task ends or the runtime shuts down.
    pub async fn run(&self) -> Result<()> {
        let mut handles = Vec::new();

        for schedule in &self.subnets {
            if !schedule.enabled {
                tracing::info!(cidr = %schedule.cidr, "Subnet disabled, skipping");
                continue;
            }
            let subnet: IpNet = schedule
                .cidr
                .parse()
                .map_err(|_| DiscoverError::InvalidSubnet(schedule.cidr.clone()))?;

            let task = SubnetTask {
                subnet,
                name: schedule.name.clone(),
                every: Duration::from_secs(schedule.interval_secs.max(1)),
                orchestrator: self.orchestrator.clone(),
                registry: self.registry.clone(),
                journal: self.journal.clone(),
                enricher: self.enricher.clone(),
            };
            handles.push(tokio::spawn(task.run()));
        }

        let subnet_count = handles.len();
        if self.retention_days > 0 {
            let task = RetentionTask {
                journal: self.journal.clone(),
                keep: TimeDelta::days(i64::from(self.retention_days)),
            };
            handles.push(tokio::spawn(task.run()));
        }

        tracing::info!(subnet_count, retention_days = self.retention_days, "Scheduler started");

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Subnet scan task panicked");
            }
        }

        Ok(())
    }
}

struct SubnetTask {
    subnet: IpNet,
    name: Option<String>,
    every: Duration,
    orchestrator: Arc<ScanOrchestrator>,
    registry: Arc<Registry>,
    journal: Arc<dyn JournalStore>,
    enricher: Option<Arc<VendorEnricher>>,
}

impl SubnetTask {
    async fn run(self) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tracing::info!(subnet = %self.subnet, name = ?self.name, "Scheduled scan triggered");

            let result = run_single_scan(
                &self.orchestrator,
                &self.registry,
                self.journal.as_ref(),
                self.enricher.as_ref(),
                &self.subnet,
            )
            .await;

            match result {
                Ok(_) => {}
                Err(DiscoverError::ScanInProgress) => {
                    tracing::info!(subnet = %self.subnet, "Scan already running, tick skipped");
                }
                Err(e) => {
                    tracing::error!(subnet = %self.subnet, error = %e, "Scheduled scan failed");
                }
            }
        }
    }
}

struct RetentionTask {
    journal: Arc<dyn JournalStore>,
    keep: TimeDelta,
}

impl RetentionTask {
    async fn run(self) {
        let mut ticker = interval(Duration::from_secs(24 * 3600));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let journal = self.journal.clone();
            let before = Utc::now() - self.keep;
            match tokio::task::spawn_blocking(move || journal.prune(before)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Journal pruning failed"),
                Err(e) => tracing::error!(error = %e, "Journal pruning task panicked"),
            }
        }
    }
}
