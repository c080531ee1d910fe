//! CLI entry point for lanwatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use lanwatch_discover::config::DiscoverConfig;
use lanwatch_discover::DiscoveryService;
use lanwatch_registry::DeviceFilter;

#[derive(Parser)]
#[command(name = "lanwatch")]
#[command(about = "LAN device discovery and registry")]
struct Cli {
    /// Config file prefix (default: lanwatch).
    #[arg(short, long, default_value = "lanwatch", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single scan of one subnet and exit.
    Scan {
        /// Target subnet in CIDR notation, e.g. 192.168.1.0/24.
        #[arg(short, long)]
        subnet: String,
    },
    /// Scan the configured subnets on their schedules.
    Daemon,
    /// List known devices.
    Devices {
        #[arg(long)]
        online: bool,
        #[arg(long)]
        vpn: bool,
        #[arg(long)]
        managed: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one device.
    Device { mac: String },
    /// Registry-wide counts.
    Stats,
    /// Flag a device as managed.
    Manage {
        mac: String,
        /// Clear the flag instead of setting it.
        #[arg(long)]
        unset: bool,
    },
    /// Presence statistics for one device.
    Uptime { mac: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = load_discover_config(&cli.config)?;
    let service = DiscoveryService::from_config(config).await?;

    match cli.command {
        Command::Scan { subnet } => print_json(&service.scan_all(&subnet).await?)?,
        Command::Daemon => {
            let scheduler = service.scheduler();
            tokio::select! {
                result = scheduler.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                    if let Err(e) = service.registry().flush().await {
                        tracing::error!(error = %e, "Registry flush on shutdown failed");
                    }
                }
            }
        }
        Command::Devices {
            online,
            vpn,
            managed,
            limit,
        } => {
            let filter = DeviceFilter {
                online_only: online,
                vpn_only: vpn,
                managed_only: managed,
                limit,
            };
            print_json(&service.get_all_devices(&filter).await)?;
        }
        Command::Device { mac } => print_json(&service.get_device(&mac).await?)?,
        Command::Stats => print_json(&service.get_statistics().await)?,
        Command::Manage { mac, unset } => print_json(&service.mark_managed(&mac, !unset).await?)?,
        Command::Uptime { mac } => print_json(&service.device_uptime(&mac).await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("LANWATCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(_) => Ok(DiscoverConfig::default()),
    }
}
