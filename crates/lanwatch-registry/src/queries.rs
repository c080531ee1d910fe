//! Read operations. All of them are served from the committed snapshot.

use lanwatch_core::{normalize_mac, DeviceRecord};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::registry::Registry;

/// Filters for [`Registry::get_all_devices`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilter {
    #[serde(default)]
    pub online_only: bool,
    #[serde(default)]
    pub vpn_only: bool,
    #[serde(default)]
    pub managed_only: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl DeviceFilter {
    fn matches(&self, record: &DeviceRecord) -> bool {
        (!self.online_only || record.is_online)
            && (!self.vpn_only || record.is_vpn_connected)
            && (!self.managed_only || record.is_managed)
    }
}

/// Aggregate counts over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatistics {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub vpn_connected: usize,
    pub managed: usize,
    /// Devices that have held more than one distinct IP.
    pub dhcp_dynamic: usize,
}

impl Registry {
    /// Devices matching `filter`, most recently seen first.
    pub async fn get_all_devices(&self, filter: &DeviceFilter) -> Vec<DeviceRecord> {
        let snapshot = self.snapshot().await;
        let mut devices: Vec<DeviceRecord> = snapshot
            .devices
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.mac.cmp(&b.mac)));
        if let Some(limit) = filter.limit {
            devices.truncate(limit);
        }
        devices
    }

    /// One device by MAC, in any casing or separator style.
    pub async fn get_device(&self, mac: &str) -> Result<DeviceRecord> {
        let mac = normalize_mac(mac)?;
        self.snapshot()
            .await
            .devices
            .get(&mac)
            .cloned()
            .ok_or(RegistryError::NotFound { mac })
    }

    pub async fn get_statistics(&self) -> RegistryStatistics {
        let snapshot = self.snapshot().await;
        let mut stats = RegistryStatistics::default();
        for record in snapshot.devices.values() {
            stats.total += 1;
            if record.is_online {
                stats.online += 1;
            } else {
                stats.offline += 1;
            }
            stats.vpn_connected += record.is_vpn_connected as usize;
            stats.managed += record.is_managed as usize;
            stats.dhcp_dynamic += record.is_dhcp_dynamic() as usize;
        }
        stats
    }

    /// MACs of devices that still have no vendor.
    pub async fn pending_vendor_lookups(&self) -> Vec<String> {
        self.snapshot()
            .await
            .devices
            .values()
            .filter(|r| r.vendor.is_none())
            .map(|r| r.mac.clone())
            .collect()
    }
}
