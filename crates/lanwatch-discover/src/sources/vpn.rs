//! Tailscale overlay membership.
//!
//! Peers are keyed by hostname and overlay address only. They are not
//! filtered by subnet: the orchestrator attaches them to LAN devices by
//! hostname.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};
use serde::Deserialize;

use super::{SourceOutcome, SourceScanner};
use crate::config::VpnConfig;
use crate::error::{DiscoverError, Result};
use crate::tool;

/// The subset of `tailscale status --json` this source reads.
#[derive(Debug, Deserialize)]
pub struct TailscaleStatus {
    #[serde(rename = "Self")]
    pub self_node: Option<PeerStatus>,
    #[serde(rename = "Peer", default)]
    pub peers: BTreeMap<String, PeerStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PeerStatus {
    #[serde(rename = "HostName", default)]
    pub host_name: String,
    #[serde(rename = "TailscaleIPs", default)]
    pub tailscale_ips: Vec<String>,
    #[serde(rename = "Online", default)]
    pub online: bool,
    #[serde(rename = "OS", default)]
    pub os: String,
}

impl PeerStatus {
    /// Prefer the IPv4 overlay address.
    pub fn overlay_ip(&self) -> Option<&str> {
        self.tailscale_ips
            .iter()
            .find(|ip| !ip.contains(':'))
            .or_else(|| self.tailscale_ips.first())
            .map(String::as_str)
    }

    fn observation(&self) -> Option<Observation> {
        if self.host_name.is_empty() {
            return None;
        }
        let mut obs = Observation::new(Source::Vpn)
            .with_hostname(&self.host_name)
            .with_os_guess(&self.os)
            .with_online(self.online);
        if let Some(ip) = self.overlay_ip() {
            obs = obs.with_ip(ip);
        }
        Some(obs)
    }
}

pub struct TailscaleStatusReader {
    config: VpnConfig,
}

impl TailscaleStatusReader {
    pub fn new(config: VpnConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceScanner for TailscaleStatusReader {
    fn source(&self) -> Source {
        Source::Vpn
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn scan(&self, _subnet: &IpNet) -> Result<SourceOutcome> {
        let Some(output) = tool::run_tool(&self.config.path, &["status", "--json"]).await? else {
            return Ok(SourceOutcome::Unavailable {
                tool: self.config.path.clone(),
            });
        };
        let stdout = tool::stdout_of(&self.config.path, &output)?;
        Ok(SourceOutcome::Observed(parse_status(&stdout)?))
    }
}

/// Observations for the local node and every peer with a hostname.
pub fn parse_status(json: &str) -> Result<Vec<Observation>> {
    let status: TailscaleStatus =
        serde_json::from_str(json).map_err(|e| DiscoverError::OutputParse {
            tool: "tailscale".to_string(),
            reason: e.to_string(),
        })?;

    Ok(status
        .self_node
        .iter()
        .chain(status.peers.values())
        .filter_map(PeerStatus::observation)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanwatch_core::ScanKind;

    const STATUS: &str = r#"{
        "Version": "1.76.1",
        "BackendState": "Running",
        "Self": {
            "HostName": "homelab",
            "TailscaleIPs": ["100.101.102.1", "fd7a:115c:a1e0::1"],
            "Online": true,
            "OS": "linux"
        },
        "Peer": {
            "nodekey:aaa": {
                "HostName": "TITO",
                "TailscaleIPs": ["fd7a:115c:a1e0::2", "100.101.102.2"],
                "Online": true,
                "OS": "iOS"
            },
            "nodekey:bbb": {
                "HostName": "old-laptop",
                "TailscaleIPs": ["100.101.102.3"],
                "Online": false,
                "OS": "windows"
            }
        }
    }"#;

    #[test]
    fn test_parse_status() {
        let observations = parse_status(STATUS).unwrap();
        assert_eq!(observations.len(), 3);
        assert!(observations.iter().all(|o| o.scan_kind == ScanKind::Overlay));
        assert!(observations.iter().all(|o| o.mac.is_none()));

        let tito = observations
            .iter()
            .find(|o| o.hostname.as_deref() == Some("TITO"))
            .unwrap();
        assert_eq!(tito.ip.as_deref(), Some("100.101.102.2"));
        assert_eq!(tito.os_guess.as_deref(), Some("iOS"));
        assert!(tito.is_online);

        let laptop = observations
            .iter()
            .find(|o| o.hostname.as_deref() == Some("old-laptop"))
            .unwrap();
        assert!(!laptop.is_online);
    }

    #[test]
    fn test_logged_out_status() {
        let observations = parse_status(r#"{"BackendState": "NeedsLogin", "Self": null}"#).unwrap();
        assert!(observations.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_status("not json").unwrap_err();
        assert!(matches!(err, DiscoverError::OutputParse { .. }));
    }
}
