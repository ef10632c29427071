//! canflashd - CAN bootloader flashing daemon
//!
//! Usage:
//!   canflashd [OPTIONS]
//!
//! Without a config file the stock settings are used: SocketCAN on can0
//! and the bridge at http://localhost:5000.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use canflash_can::config::{MockConfig, SocketCanConfig};
use canflash_can::{create_connector, TransportConfig};
use canflash_client::BridgeClient;
use canflashd::{DaemonConfig, SessionOrchestrator};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "canflashd")]
#[command(author, version, about = "CAN bootloader flashing daemon")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CANFLASH_CONFIG")]
    config: Option<PathBuf>,

    /// CAN interface, overrides the config file
    #[arg(short, long)]
    interface: Option<String>,

    /// Bridge base URL, overrides the config file
    #[arg(short, long, env = "CANFLASH_BRIDGE_URL")]
    bridge_url: Option<String>,

    /// Use the mock transport instead of a CAN adapter
    #[arg(long)]
    mock: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    tracing::info!("Starting canflashd");

    let config = load_config(&args)?;
    let connector =
        create_connector(&config.transport).context("Failed to create CAN transport")?;
    let bridge = Arc::new(
        BridgeClient::from_config(&config.bridge).context("Failed to create bridge client")?,
    );
    tracing::info!(bridge = %bridge.base_url(), "Bridge client ready");

    let mut session = SessionOrchestrator::new(config, bridge, connector);
    session
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}

fn init_logging(args: &Args) {
    let default_filter = if args.verbose {
        "canflashd=debug,canflash_can=debug,canflash_client=debug"
    } else {
        "canflashd=info,canflash_can=info,canflash_client=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let json = args.json_logs;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();
}

/// Config file (or defaults) with the command-line overrides applied
fn load_config(args: &Args) -> anyhow::Result<DaemonConfig> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading config");
            DaemonConfig::load(path)?
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            DaemonConfig::default()
        }
    };

    if args.mock {
        config.transport = TransportConfig::Mock(MockConfig::default());
    }
    if let Some(interface) = &args.interface {
        if args.mock {
            tracing::warn!("--interface ignored with --mock");
        } else {
            let mut can = match &config.transport {
                TransportConfig::SocketCan(cfg) => cfg.clone(),
                TransportConfig::Mock(_) => SocketCanConfig::default(),
            };
            can.interface = interface.clone();
            config.transport = TransportConfig::SocketCan(can);
        }
    }
    if let Some(url) = &args.bridge_url {
        config.bridge.base_url = url.clone();
    }

    match &config.transport {
        TransportConfig::SocketCan(cfg) => tracing::info!(
            interface = %cfg.interface,
            bitrate = cfg.bitrate,
            "Using SocketCAN transport"
        ),
        TransportConfig::Mock(_) => tracing::info!("Using mock transport"),
    }

    Ok(config)
}
