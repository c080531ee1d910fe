//! ICMP echo sweep.
//!
//! Probes every host address of the subnet with the system `ping` binary,
//! bounded by a semaphore. Only hosts that reply produce an observation;
//! ping cannot see MACs, so these are correlated by IP.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{SourceOutcome, SourceScanner};
use crate::config::PingConfig;
use crate::error::Result;
use crate::tool;

pub struct PingSweep {
    config: PingConfig,
}

impl PingSweep {
    pub fn new(config: PingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceScanner for PingSweep {
    fn source(&self) -> Source {
        Source::Ping
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn scan(&self, subnet: &IpNet) -> Result<SourceOutcome> {
        if tool::run_tool(&self.config.path, &["-V"]).await?.is_none() {
            return Ok(SourceOutcome::Unavailable {
                tool: self.config.path.clone(),
            });
        }

        let start = Instant::now();
        let targets: Vec<IpAddr> = subnet.hosts().take(self.config.max_hosts).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut probes = JoinSet::new();

        for addr in &targets {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let path = self.config.path.clone();
            let ip = addr.to_string();
            probes.spawn(async move {
                let _permit = permit;
                let rtt = probe(&path, &ip).await;
                (ip, rtt)
            });
        }

        let mut replies: Vec<(IpAddr, Observation)> = Vec::new();
        while let Some(joined) = probes.join_next().await {
            let Ok((ip, Some(rtt))) = joined else {
                continue;
            };
            let Ok(addr) = ip.parse::<IpAddr>() else {
                continue;
            };
            let mut obs = Observation::new(Source::Ping).with_ip(&ip);
            if let Some(ms) = rtt {
                obs = obs.with_response_time(ms);
            }
            replies.push((addr, obs));
        }
        replies.sort_by_key(|(addr, _)| *addr);

        tracing::info!(
            target = %subnet,
            probed = targets.len(),
            replied = replies.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Ping sweep complete"
        );

        Ok(SourceOutcome::Observed(
            replies.into_iter().map(|(_, obs)| obs).collect(),
        ))
    }
}

/// `Some(rtt)` when the host replied, `None` when it did not.
async fn probe(path: &str, ip: &str) -> Option<Option<f64>> {
    match tool::run_tool(path, &["-c", "1", "-W", "1", ip]).await {
        Ok(Some(output)) if output.status.success() => {
            Some(parse_rtt(&String::from_utf8_lossy(&output.stdout)))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(ip = %ip, error = %e, "Ping probe failed");
            None
        }
    }
}

/// Round-trip time from a ping reply line (`... time=0.423 ms`).
pub fn parse_rtt(stdout: &str) -> Option<f64> {
    let (_, rest) = stdout.split_once("time=")?;
    let value: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    value.parse().ok()
}
