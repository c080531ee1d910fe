//! Vendor (OUI) enrichment.
//!
//! Runs after a scan, outside the scan's critical path. External calls are
//! serialized with a minimum spacing, and every answer (including "no
//! answer") is cached per OUI so repeated failures cannot starve the rate
//! limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lanwatch_core::mac::{is_locally_administered, oui};
use lanwatch_registry::Registry;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::EnrichmentConfig;
use crate::error::{DiscoverError, Result};

/// Resolves a MAC to a vendor name.
#[async_trait]
pub trait VendorLookup: Send + Sync {
    /// `Ok(None)` when the registry of vendors has no entry.
    async fn lookup(&self, mac: &str) -> Result<Option<String>>;
}

/// Plain-text vendor API: `GET {endpoint}/{mac}`.
pub struct HttpVendorLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVendorLookup {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DiscoverError::Lookup(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VendorLookup for HttpVendorLookup {
    async fn lookup(&self, mac: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.endpoint, mac);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DiscoverError::Lookup(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| DiscoverError::Lookup(e.to_string()))?;
                let vendor = body.trim();
                Ok((!vendor.is_empty()).then(|| vendor.to_string()))
            }
            status => Err(DiscoverError::Lookup(format!("{url} returned {status}"))),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    vendor: Option<String>,
    expires_at: Instant,
}

/// Per-OUI answers with separate lifetimes for hits and misses.
#[derive(Debug)]
pub struct VendorCache {
    success_ttl: Duration,
    failure_ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl VendorCache {
    pub fn new(success_ttl: Duration, failure_ttl: Duration) -> Self {
        Self {
            success_ttl,
            failure_ttl,
            entries: HashMap::new(),
        }
    }

    /// `Some(answer)` while a cached answer is fresh.
    pub fn get(&self, oui: &str, now: Instant) -> Option<Option<String>> {
        self.entries
            .get(oui)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.vendor.clone())
    }

    pub fn store(&mut self, oui: &str, vendor: Option<String>, now: Instant) {
        let ttl = if vendor.is_some() {
            self.success_ttl
        } else {
            self.failure_ttl
        };
        self.entries.insert(
            oui.to_string(),
            CacheEntry {
                vendor,
                expires_at: now + ttl,
            },
        );
    }
}

pub struct VendorEnricher {
    lookup: Arc<dyn VendorLookup>,
    registry: Arc<Registry>,
    cache: Mutex<VendorCache>,
    min_interval: Duration,
    /// Held for the duration of a run; stores the time of the last
    /// external call.
    last_call: Mutex<Option<Instant>>,
}

impl VendorEnricher {
    pub fn new(
        lookup: Arc<dyn VendorLookup>,
        registry: Arc<Registry>,
        config: &EnrichmentConfig,
    ) -> Self {
        Self {
            lookup,
            registry,
            cache: Mutex::new(VendorCache::new(
                Duration::from_secs(config.success_ttl_secs),
                Duration::from_secs(config.failure_ttl_secs),
            )),
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_call: Mutex::new(None),
        }
    }

    /// Run in the background, logging the outcome.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let enricher = Arc::clone(self);
        tokio::spawn(async move {
            match enricher.run().await {
                Ok(0) => {}
                Ok(resolved) => tracing::info!(resolved, "Vendor enrichment complete"),
                Err(e) => tracing::warn!(error = %e, "Vendor enrichment failed"),
            }
        })
    }

    /// Look up vendors for every device that has none and write them to
    /// the registry. Returns the number of devices resolved. A run that
    /// overlaps another one returns immediately.
    pub async fn run(&self) -> Result<usize> {
        let Ok(mut last_call) = self.last_call.try_lock() else {
            tracing::debug!("Vendor enrichment already running");
            return Ok(0);
        };

        let mut resolved: Vec<(String, String)> = Vec::new();
        for mac in self.registry.pending_vendor_lookups().await {
            if is_locally_administered(&mac) {
                continue;
            }
            let Some(prefix) = oui(&mac) else {
                continue;
            };

            if let Some(cached) = self.cache.lock().await.get(prefix, Instant::now()) {
                if let Some(vendor) = cached {
                    resolved.push((mac.clone(), vendor));
                }
                continue;
            }

            if let Some(previous) = *last_call {
                let wait = self.min_interval.saturating_sub(previous.elapsed());
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            *last_call = Some(Instant::now());

            let vendor = match self.lookup.lookup(&mac).await {
                Ok(vendor) => vendor,
                Err(e) => {
                    tracing::debug!(mac = %mac, error = %e, "Vendor lookup failed");
                    None
                }
            };
            self.cache
                .lock()
                .await
                .store(prefix, vendor.clone(), Instant::now());
            if let Some(vendor) = vendor {
                resolved.push((mac.clone(), vendor));
            }
        }

        if resolved.is_empty() {
            return Ok(0);
        }
        self.registry.apply_vendors(&resolved).await?;
        Ok(resolved.len())
    }
}
