//! Kernel neighbor cache.
//!
//! Reads `ip neigh show`, falling back to `/proc/net/arp` when iproute2 is
//! absent. Entries outside the target subnet are dropped.

use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};

use super::{in_subnet, SourceOutcome, SourceScanner};
use crate::config::ArpConfig;
use crate::error::Result;
use crate::tool;

const PROC_ARP: &str = "/proc/net/arp";

/// One resolved neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: String,
    pub mac: String,
}

pub struct ArpCache {
    config: ArpConfig,
}

impl ArpCache {
    pub fn new(config: ArpConfig) -> Self {
        Self { config }
    }

    async fn read_entries(&self) -> Result<Option<Vec<ArpEntry>>> {
        if let Some(output) = tool::run_tool("ip", &["neigh", "show"]).await? {
            let stdout = tool::stdout_of("ip", &output)?;
            return Ok(Some(parse_ip_neigh_output(&stdout)));
        }

        match tokio::fs::read_to_string(PROC_ARP).await {
            Ok(table) => Ok(Some(parse_proc_arp(&table))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SourceScanner for ArpCache {
    fn source(&self) -> Source {
        Source::Arp
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn scan(&self, subnet: &IpNet) -> Result<SourceOutcome> {
        let Some(entries) = self.read_entries().await? else {
            return Ok(SourceOutcome::Unavailable {
                tool: PROC_ARP.to_string(),
            });
        };

        let observations: Vec<Observation> = entries
            .iter()
            .filter(|e| in_subnet(subnet, &e.ip))
            .map(|e| Observation::new(Source::Arp).with_ip(&e.ip).with_mac(&e.mac))
            .collect();

        tracing::debug!(
            target = %subnet,
            neighbors = entries.len(),
            in_subnet = observations.len(),
            "Read neighbor cache"
        );

        Ok(SourceOutcome::Observed(observations))
    }
}

/// Parse `ip neigh show` output.
///
/// ```text
/// 192.168.1.1 dev eth0 lladdr 00:1a:2b:3c:4d:5e REACHABLE
/// 192.168.1.45 dev eth0 lladdr a8:42:a1:b9:53:23 STALE
/// 192.168.1.77 dev eth0  FAILED
/// ```
///
/// STALE entries are kept; FAILED and INCOMPLETE entries carry no usable
/// address and are dropped.
pub fn parse_ip_neigh_output(output: &str) -> Vec<ArpEntry> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let state = parts.last()?;
            if matches!(*state, "FAILED" | "INCOMPLETE") {
                return None;
            }
            let lladdr = parts.iter().position(|p| *p == "lladdr")?;
            let mac = parts.get(lladdr + 1)?;
            entry(parts.first()?, mac)
        })
        .collect()
}

/// Parse `/proc/net/arp`.
///
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 192.168.1.1      0x1         0x2         00:1a:2b:3c:4d:5e     *        eth0
/// ```
///
/// Flags `0x0` marks an incomplete entry.
pub fn parse_proc_arp(table: &str) -> Vec<ArpEntry> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 || parts[2] == "0x0" {
                return None;
            }
            entry(parts[0], parts[3])
        })
        .collect()
}

fn entry(ip: &str, mac: &str) -> Option<ArpEntry> {
    if mac == "00:00:00:00:00:00" || ip.parse::<std::net::IpAddr>().is_err() {
        return None;
    }
    Some(ArpEntry {
        ip: ip.to_string(),
        mac: mac.to_string(),
    })
}
