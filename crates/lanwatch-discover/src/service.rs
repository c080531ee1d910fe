//! `DiscoveryService`: the facade callers (CLI, HTTP layer) use.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use ipnet::IpNet;
use lanwatch_core::{normalize_mac, ConflictRecord, DeviceRecord};
use lanwatch_fusion::{calculate_uptime, detect_conflicts, UptimeStats};
use lanwatch_journal::{FileJournalStore, JournalStore};
use lanwatch_registry::{DeviceFilter, Registry, RegistryError, RegistryStatistics};

use crate::config::DiscoverConfig;
use crate::enrichment::{HttpVendorLookup, VendorEnricher};
use crate::error::{DiscoverError, Result};
use crate::orchestrator::ScanOrchestrator;
use crate::scheduler::{self, ScanResult, ScanScheduler};

pub struct DiscoveryService {
    config: DiscoverConfig,
    orchestrator: Arc<ScanOrchestrator>,
    registry: Arc<Registry>,
    journal: Arc<dyn JournalStore>,
    enricher: Option<Arc<VendorEnricher>>,
}

impl DiscoveryService {
    /// Wire up sources, registry, journal and enrichment from config.
    pub async fn from_config(config: DiscoverConfig) -> Result<Self> {
        let registry = Registry::shared(&config.registry_path).await?;
        let journal: Arc<dyn JournalStore> =
            Arc::new(FileJournalStore::new(&config.journal_dir)?);
        let enricher = if config.enrichment.enabled {
            let lookup = Arc::new(HttpVendorLookup::new(&config.enrichment)?);
            Some(Arc::new(VendorEnricher::new(
                lookup,
                registry.clone(),
                &config.enrichment,
            )))
        } else {
            None
        };
        let orchestrator = Arc::new(ScanOrchestrator::from_config(&config));

        Ok(Self::new(config, orchestrator, registry, journal, enricher))
    }

    pub fn new(
        config: DiscoverConfig,
        orchestrator: Arc<ScanOrchestrator>,
        registry: Arc<Registry>,
        journal: Arc<dyn JournalStore>,
        enricher: Option<Arc<VendorEnricher>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            registry,
            journal,
            enricher,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Scan `subnet` (CIDR notation) once.
    pub async fn scan_all(&self, subnet: &str) -> Result<ScanResult> {
        let subnet: IpNet = subnet
            .parse()
            .map_err(|_| DiscoverError::InvalidSubnet(subnet.to_string()))?;
        scheduler::run_single_scan(
            &self.orchestrator,
            &self.registry,
            self.journal.as_ref(),
            self.enricher.as_ref(),
            &subnet,
        )
        .await
    }

    /// A scheduler over the configured subnets, sharing this service's
    /// components.
    pub fn scheduler(&self) -> ScanScheduler {
        ScanScheduler::new(
            self.config.subnets.clone(),
            self.orchestrator.clone(),
            self.registry.clone(),
            self.journal.clone(),
            self.enricher.clone(),
        )
        .with_journal_retention(self.config.journal_retention_days)
    }

    pub async fn get_all_devices(&self, filter: &DeviceFilter) -> Vec<DeviceRecord> {
        self.registry.get_all_devices(filter).await
    }

    pub async fn get_device(&self, mac: &str) -> Result<DeviceRecord> {
        Ok(self.registry.get_device(mac).await?)
    }

    pub async fn get_statistics(&self) -> RegistryStatistics {
        self.registry.get_statistics().await
    }

    pub async fn mark_managed(&self, mac: &str, managed: bool) -> Result<DeviceRecord> {
        Ok(self.registry.mark_as_managed(mac, managed).await?)
    }

    /// Presence statistics for one device over the configured window.
    pub async fn device_uptime(&self, mac: &str) -> Result<UptimeStats> {
        let mac = normalize_mac(mac).map_err(RegistryError::from)?;
        self.registry.get_device(&mac).await?;

        let days = self.config.uptime_window_days;
        let from = (days > 0).then(|| Utc::now() - TimeDelta::days(i64::from(days)));
        let journal = self.journal.clone();
        let history = tokio::task::spawn_blocking(move || journal.device_history(&mac, from))
            .await
            .map_err(|e| DiscoverError::Io(std::io::Error::other(e)))??;
        Ok(calculate_uptime(&history))
    }

    /// IP conflicts among devices currently online.
    pub async fn current_conflicts(&self) -> Vec<ConflictRecord> {
        let online = self
            .registry
            .get_all_devices(&DeviceFilter {
                online_only: true,
                ..DeviceFilter::default()
            })
            .await;
        detect_conflicts(&online, Utc::now())
    }
}
