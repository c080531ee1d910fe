//! Multicast DNS browsing through avahi.
//!
//! avahi does not report link-layer addresses, so the observations carry
//! a hostname and an IP and are correlated by the orchestrator.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};

use super::{in_subnet, SourceOutcome, SourceScanner};
use crate::config::MdnsConfig;
use crate::error::Result;
use crate::tool;

pub struct MdnsBrowser {
    config: MdnsConfig,
}

impl MdnsBrowser {
    pub fn new(config: MdnsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceScanner for MdnsBrowser {
    fn source(&self) -> Source {
        Source::Mdns
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn scan(&self, subnet: &IpNet) -> Result<SourceOutcome> {
        let Some(output) = tool::run_tool(&self.config.path, &["-a", "-r", "-p", "-t"]).await?
        else {
            return Ok(SourceOutcome::Unavailable {
                tool: self.config.path.clone(),
            });
        };
        let stdout = tool::stdout_of(&self.config.path, &output)?;

        let observations = parse_browse_output(&stdout)
            .into_iter()
            .filter(|(ip, _)| in_subnet(subnet, ip))
            .map(|(ip, hostname)| {
                Observation::new(Source::Mdns)
                    .with_ip(&ip)
                    .with_hostname(&hostname)
            })
            .collect();

        Ok(SourceOutcome::Observed(observations))
    }
}

/// Resolved `(ip, hostname)` pairs from `avahi-browse -p -r` output, one
/// per IP.
///
/// Resolved lines start with `=` and are `;`-separated:
/// `=;iface;proto;name;type;domain;hostname;address;port;txt`.
pub fn parse_browse_output(stdout: &str) -> Vec<(String, String)> {
    let mut by_ip: BTreeMap<String, String> = BTreeMap::new();
    for line in stdout.lines().filter(|l| l.starts_with('=')) {
        let fields: Vec<&str> = line.split(';').collect();
        let (Some(hostname), Some(ip)) = (fields.get(6), fields.get(7)) else {
            continue;
        };
        if hostname.is_empty() || ip.parse::<std::net::IpAddr>().is_err() {
            continue;
        }
        by_ip
            .entry(ip.to_string())
            .or_insert_with(|| hostname.to_string());
    }
    by_ip.into_iter().collect()
}
