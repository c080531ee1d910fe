//! Nmap XML output deserialization.
//!
//! `nmap -oX -` writes structured XML to stdout; these structs deserialize
//! the subset host discovery needs using `quick-xml` with serde.

use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct NmapRun {
    #[serde(rename = "@args")]
    pub args: Option<String>,
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
    pub runstats: Option<RunStats>,
}

/// A single host from scan results.
#[derive(Debug, Clone, Deserialize)]
pub struct NmapHost {
    pub status: Option<HostStatus>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub hostnames: Option<Hostnames>,
    pub os: Option<OsMatches>,
    pub times: Option<Times>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostStatus {
    #[serde(rename = "@state")]
    pub state: String,
    #[serde(rename = "@reason")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
    #[serde(rename = "@vendor")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<Hostname>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostname {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub hostname_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatches {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<OsMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatch {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@accuracy")]
    pub accuracy: Option<String>,
}

/// Round-trip timing, in microseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct Times {
    #[serde(rename = "@srtt")]
    pub srtt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStats {
    pub hosts: Option<RunStatsHosts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStatsHosts {
    #[serde(rename = "@up")]
    pub up: Option<String>,
    #[serde(rename = "@down")]
    pub down: Option<String>,
    #[serde(rename = "@total")]
    pub total: Option<String>,
}

impl NmapHost {
    /// Extract the IPv4 address, if present.
    pub fn ipv4(&self) -> Option<&str> {
        self.address_of("ipv4").map(|a| a.addr.as_str())
    }

    /// Extract the MAC address, if present.
    pub fn mac(&self) -> Option<&str> {
        self.address_of("mac").map(|a| a.addr.as_str())
    }

    /// Vendor nmap attached to the MAC address.
    pub fn vendor(&self) -> Option<&str> {
        self.address_of("mac").and_then(|a| a.vendor.as_deref())
    }

    /// Prefer the user-assigned name over the reverse-DNS one.
    pub fn hostname(&self) -> Option<&str> {
        let names = &self.hostnames.as_ref()?.hostnames;
        names
            .iter()
            .find(|h| h.hostname_type.as_deref() == Some("user"))
            .or_else(|| names.first())
            .map(|h| h.name.as_str())
    }

    /// Check if the host is up.
    pub fn is_up(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.state == "up")
    }

    /// Get the best OS match name (nmap lists the most accurate first).
    pub fn os_name(&self) -> Option<&str> {
        self.os
            .as_ref()
            .and_then(|os| os.matches.first())
            .map(|m| m.name.as_str())
    }

    /// Smoothed round-trip time in milliseconds.
    pub fn rtt_ms(&self) -> Option<f64> {
        self.times
            .as_ref()
            .and_then(|t| t.srtt.as_deref())
            .and_then(|us| us.parse::<f64>().ok())
            .filter(|us| *us > 0.0)
            .map(|us| us / 1000.0)
    }

    fn address_of(&self, kind: &str) -> Option<&Address> {
        self.addresses.iter().find(|a| a.addr_type == kind)
    }
}

/// Parse nmap XML bytes into a structured `NmapRun`.
pub fn parse_nmap_xml(xml: &[u8]) -> Result<NmapRun> {
    quick_xml::de::from_reader(xml).map_err(|e| DiscoverError::XmlParse(format!("{e}")))
}
