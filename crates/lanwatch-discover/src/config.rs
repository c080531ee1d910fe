//! Configuration for the lanwatch discovery daemon.

use serde::Deserialize;

/// Top-level discover configuration.
///
/// Loaded from the `[discover]` section of `lanwatch.toml` or
/// `LANWATCH__DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Registry document location.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Root directory of the scan journal.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: String,

    /// Journal days to keep; older day directories are deleted. 0 keeps
    /// everything.
    #[serde(default = "default_journal_retention_days")]
    pub journal_retention_days: u32,

    /// How far back `uptime` reads the journal. 0 reads all of it.
    #[serde(default = "default_uptime_window_days")]
    pub uptime_window_days: u32,

    /// Pause between two consecutive sources of one scan.
    #[serde(default = "default_inter_source_delay")]
    pub inter_source_delay_ms: u64,

    /// Per-subnet scheduling configuration.
    #[serde(default)]
    pub subnets: Vec<SubnetSchedule>,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// A subnet with its scan schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct SubnetSchedule {
    /// CIDR target (e.g., "192.168.1.0/24").
    pub cidr: String,

    /// Human-readable name for this subnet.
    pub name: Option<String>,

    /// Scan interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Whether this subnet is enabled for scanning.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub nmap: NmapConfig,
    #[serde(default)]
    pub ping: PingConfig,
    #[serde(default)]
    pub arp: ArpConfig,
    #[serde(default)]
    pub dhcp: DhcpConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default)]
    pub vpn: VpnConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_nmap_path")]
    pub path: String,
    #[serde(default)]
    pub profile: ScanProfile,
    #[serde(default = "default_nmap_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ping_path")]
    pub path: String,
    #[serde(default = "default_ping_timeout")]
    pub timeout_secs: u64,
    /// Probes in flight at once.
    #[serde(default = "default_ping_concurrency")]
    pub concurrency: usize,
    /// Upper bound on addresses probed per scan.
    #[serde(default = "default_ping_max_hosts")]
    pub max_hosts: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DhcpConfig {
    #[serde(default)]
    pub enabled: bool,
    /// dnsmasq lease file.
    #[serde(default = "default_leases_path")]
    pub leases_path: String,
    #[serde(default = "default_cache_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MdnsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_avahi_path")]
    pub path: String,
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VpnConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tailscale_path")]
    pub path: String,
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,
}

/// Vendor (OUI) lookup settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_vendor_endpoint")]
    pub endpoint: String,
    /// Minimum spacing between two external calls.
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    #[serde(default = "default_success_ttl")]
    pub success_ttl_secs: u64,
    #[serde(default = "default_failure_ttl")]
    pub failure_ttl_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Predefined nmap host-discovery profiles.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanProfile {
    /// Ping sweep only: `-sn -T4`
    #[default]
    Quick,
    /// Ping sweep with forced reverse DNS: `-sn -R`
    Standard,
    /// Fast port scan so OS detection can run: `-O -F -R`
    Deep,
}

impl ScanProfile {
    /// Return the nmap flags for this profile.
    pub fn nmap_flags(&self) -> Vec<&'static str> {
        match self {
            Self::Quick => vec!["-sn", "-T4"],
            Self::Standard => vec!["-sn", "-R"],
            Self::Deep => vec!["-O", "-F", "-R", "--osscan-limit"],
        }
    }
}

fn default_registry_path() -> String {
    "./lanwatch/registry.json".to_string()
}

fn default_journal_dir() -> String {
    "./lanwatch/journal".to_string()
}

fn default_journal_retention_days() -> u32 {
    90
}

fn default_uptime_window_days() -> u32 {
    30
}

fn default_inter_source_delay() -> u64 {
    500
}

fn default_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_nmap_timeout() -> u64 {
    120
}

fn default_ping_path() -> String {
    "ping".to_string()
}

fn default_ping_timeout() -> u64 {
    30
}

fn default_ping_concurrency() -> usize {
    64
}

fn default_ping_max_hosts() -> usize {
    1024
}

fn default_cache_timeout() -> u64 {
    5
}

fn default_leases_path() -> String {
    "/var/lib/misc/dnsmasq.leases".to_string()
}

fn default_avahi_path() -> String {
    "avahi-browse".to_string()
}

fn default_tailscale_path() -> String {
    "tailscale".to_string()
}

fn default_resolver_timeout() -> u64 {
    10
}

fn default_vendor_endpoint() -> String {
    "https://api.macvendors.com".to_string()
}

fn default_min_interval() -> u64 {
    1100
}

fn default_success_ttl() -> u64 {
    7 * 24 * 3600
}

fn default_failure_ttl() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            journal_dir: default_journal_dir(),
            journal_retention_days: default_journal_retention_days(),
            uptime_window_days: default_uptime_window_days(),
            inter_source_delay_ms: default_inter_source_delay(),
            subnets: Vec::new(),
            sources: SourcesConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Default for NmapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_nmap_path(),
            profile: ScanProfile::default(),
            timeout_secs: default_nmap_timeout(),
        }
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_ping_path(),
            timeout_secs: default_ping_timeout(),
            concurrency: default_ping_concurrency(),
            max_hosts: default_ping_max_hosts(),
        }
    }
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_cache_timeout(),
        }
    }
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            leases_path: default_leases_path(),
            timeout_secs: default_cache_timeout(),
        }
    }
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_avahi_path(),
            timeout_secs: default_resolver_timeout(),
        }
    }
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_tailscale_path(),
            timeout_secs: default_resolver_timeout(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_vendor_endpoint(),
            min_interval_ms: default_min_interval(),
            success_ttl_secs: default_success_ttl(),
            failure_ttl_secs: default_failure_ttl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}
