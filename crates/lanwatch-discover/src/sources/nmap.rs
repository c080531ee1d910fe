//! Nmap host discovery.
//!
//! Runs nmap as a child process with `-oX -` and turns every host that
//! answered into an observation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use ipnet::IpNet;
use lanwatch_core::{Observation, Source};

use super::nmap_xml::{self, NmapRun};
use super::{SourceOutcome, SourceScanner};
use crate::config::NmapConfig;
use crate::error::Result;
use crate::tool;

pub struct NmapScanner {
    config: NmapConfig,
}

impl NmapScanner {
    pub fn new(config: NmapConfig) -> Self {
        Self { config }
    }

    fn args(&self, subnet: &IpNet) -> Vec<String> {
        let mut args: Vec<String> = self
            .config
            .profile
            .nmap_flags()
            .into_iter()
            .map(str::to_string)
            .collect();
        args.extend(["-oX", "-", "--noninteractive"].map(str::to_string));
        args.push(subnet.to_string());
        args
    }
}

#[async_trait]
impl SourceScanner for NmapScanner {
    fn source(&self) -> Source {
        Source::Nmap
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn scan(&self, subnet: &IpNet) -> Result<SourceOutcome> {
        let start = Instant::now();
        let args = self.args(subnet);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();

        tracing::info!(
            target = %subnet,
            profile = ?self.config.profile,
            "Starting nmap scan"
        );

        let Some(output) = tool::run_tool(&self.config.path, &argv).await? else {
            return Ok(SourceOutcome::Unavailable {
                tool: self.config.path.clone(),
            });
        };
        tool::stdout_of(&self.config.path, &output)?;

        let run = nmap_xml::parse_nmap_xml(&output.stdout)?;
        let observations = observations_from_run(&run);

        tracing::info!(
            target = %subnet,
            hosts_up = observations.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Nmap scan complete"
        );

        Ok(SourceOutcome::Observed(observations))
    }
}

/// One observation per host that is up and has an IPv4 address.
pub fn observations_from_run(run: &NmapRun) -> Vec<Observation> {
    run.hosts
        .iter()
        .filter(|h| h.is_up())
        .filter_map(|host| {
            let ip = host.ipv4()?;
            let mut obs = Observation::new(Source::Nmap).with_ip(ip);
            if let Some(mac) = host.mac() {
                obs = obs.with_mac(mac);
            }
            if let Some(name) = host.hostname() {
                obs = obs.with_hostname(name);
            }
            if let Some(vendor) = host.vendor() {
                obs = obs.with_vendor(vendor);
            }
            if let Some(os) = host.os_name() {
                obs = obs.with_os_guess(os);
            }
            if let Some(rtt) = host.rtt_ms() {
                obs = obs.with_response_time(rtt);
            }
            Some(obs)
        })
        .collect()
}
