//! dnsmasq lease table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};

use super::{in_subnet, SourceOutcome, SourceScanner};
use crate::config::DhcpConfig;
use crate::error::Result;

/// One active lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub mac: String,
    pub ip: String,
    pub hostname: Option<String>,
}

pub struct DhcpLeases {
    config: DhcpConfig,
}

impl DhcpLeases {
    pub fn new(config: DhcpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceScanner for DhcpLeases {
    fn source(&self) -> Source {
        Source::Dhcp
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn scan(&self, subnet: &IpNet) -> Result<SourceOutcome> {
        let contents = match tokio::fs::read_to_string(&self.config.leases_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SourceOutcome::Unavailable {
                    tool: self.config.leases_path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let observations = parse_leases(&contents, Utc::now().timestamp())
            .into_iter()
            .filter(|lease| in_subnet(subnet, &lease.ip))
            .map(|lease| {
                let obs = Observation::new(Source::Dhcp)
                    .with_mac(&lease.mac)
                    .with_ip(&lease.ip);
                match lease.hostname.as_deref() {
                    Some(name) => obs.with_hostname(name),
                    None => obs,
                }
            })
            .collect();

        Ok(SourceOutcome::Observed(observations))
    }
}

/// Parse dnsmasq lease lines: `<expiry> <mac> <ip> <hostname> <client-id>`.
///
/// Expiry `0` is an infinite lease. A hostname of `*` means none was sent.
pub fn parse_leases(contents: &str, now_epoch: i64) -> Vec<Lease> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let expiry: i64 = fields.next()?.parse().ok()?;
            let mac = fields.next()?;
            let ip = fields.next()?;
            let hostname = fields.next().filter(|h| *h != "*");

            if expiry != 0 && expiry < now_epoch {
                return None;
            }
            Some(Lease {
                mac: mac.to_string(),
                ip: ip.to_string(),
                hostname: hostname.map(str::to_string),
            })
        })
        .collect()
}
