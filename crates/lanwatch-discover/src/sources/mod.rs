//! Discovery sources.
//!
//! Every source implements [`SourceScanner`]: given a subnet it returns the
//! observations it can make, or reports that it cannot run on this host.

pub mod arp;
pub mod dhcp;
pub mod mdns;
pub mod nmap;
pub mod nmap_xml;
pub mod ping;
pub mod vpn;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};

use crate::config::SourcesConfig;
use crate::error::Result;

/// What a source produced for one scan.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Observed(Vec<Observation>),
    /// The source cannot run here; `tool` names the missing binary or file.
    Unavailable { tool: String },
}

#[async_trait]
pub trait SourceScanner: Send + Sync {
    fn source(&self) -> Source;

    /// Upper bound on one `scan` call.
    fn timeout(&self) -> Duration;

    async fn scan(&self, subnet: &IpNet) -> Result<SourceOutcome>;
}

/// Instantiate every enabled source, in scan order.
pub fn build_sources(config: &SourcesConfig) -> Vec<Arc<dyn SourceScanner>> {
    let mut sources: Vec<Arc<dyn SourceScanner>> = Vec::new();
    if config.nmap.enabled {
        sources.push(Arc::new(nmap::NmapScanner::new(config.nmap.clone())));
    }
    if config.ping.enabled {
        sources.push(Arc::new(ping::PingSweep::new(config.ping.clone())));
    }
    if config.arp.enabled {
        sources.push(Arc::new(arp::ArpCache::new(config.arp.clone())));
    }
    if config.dhcp.enabled {
        sources.push(Arc::new(dhcp::DhcpLeases::new(config.dhcp.clone())));
    }
    if config.mdns.enabled {
        sources.push(Arc::new(mdns::MdnsBrowser::new(config.mdns.clone())));
    }
    if config.vpn.enabled {
        sources.push(Arc::new(vpn::TailscaleStatusReader::new(config.vpn.clone())));
    }
    sources
}

/// Whether `ip` parses and falls inside `subnet`.
pub(crate) fn in_subnet(subnet: &IpNet, ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok_and(|addr| subnet.contains(&addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcesConfig;

    #[test]
    fn test_build_sources_respects_enabled() {
        let mut config = SourcesConfig::default();
        let all: Vec<Source> = build_sources(&config).iter().map(|s| s.source()).collect();
        assert_eq!(
            all,
            vec![Source::Nmap, Source::Ping, Source::Arp, Source::Mdns, Source::Vpn]
        );

        config.nmap.enabled = false;
        config.dhcp.enabled = true;
        let some: Vec<Source> = build_sources(&config).iter().map(|s| s.source()).collect();
        assert_eq!(
            some,
            vec![Source::Ping, Source::Arp, Source::Dhcp, Source::Mdns, Source::Vpn]
        );
    }

    #[test]
    fn test_in_subnet() {
        let net: IpNet = "192.168.1.0/24".parse().unwrap();
        assert!(in_subnet(&net, "192.168.1.40"));
        assert!(!in_subnet(&net, "192.168.2.40"));
        assert!(!in_subnet(&net, "not-an-ip"));
    }
}
