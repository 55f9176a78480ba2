//! Relay node (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   options (TOML + flags)
//!          │
//!          ▼
//!   ┌──────────────┐   stages in order    ┌────────────────────────────────┐
//!   │  bootstrap   │ ───────────────────▶ │          Dependencies          │
//!   └──────────────┘                      │ firewall  storage  identity    │
//!          │                              │ network clients  discovery     │
//!          │ ok                           │ location  nat  services        │
//!          ▼                              │ telemetry  state  node (API)   │
//!   ┌──────────────┐                      └───────────────┬────────────────┘
//!   │ wait_for_stop│ ◀── SIGINT / SIGTERM / POST /stop    │ event bus
//!   └──────────────┘                                      ▼
//!          │                              reconnect watcher, telemetry bridge
//!          ▼
//!   ┌──────────────┐
//!   │   shutdown   │  phased teardown, first error reported
//!   └──────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use relay_node::config::{load_options, DirectoryOptions, NetworkPreset, NodeOptions};
use relay_node::lifecycle::{wait_for_stop, Dependencies};
use relay_node::observability::logging;

#[derive(Parser)]
#[command(name = "relay-node")]
#[command(about = "Relay node for a decentralized VPN network", long_about = None)]
struct Cli {
    /// Options file (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network preset: default, testnet or localnet.
    #[arg(short, long)]
    network: Option<NetworkPreset>,

    /// Root of the data, storage, keystore, config and runtime directories.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Port for the local API.
    #[arg(long)]
    api_port: Option<u16>,

    /// Do not serve the local API.
    #[arg(long)]
    no_api: bool,

    /// Log level, overriding the options file.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn options(&self) -> Result<NodeOptions, relay_node::config::ConfigError> {
        let mut options = match &self.config {
            Some(path) => load_options(path)?,
            None => NodeOptions::default(),
        };

        if let Some(preset) = self.network {
            options.network.preset = preset;
        }
        if let Some(root) = &self.data_dir {
            options.directories = DirectoryOptions::under(root);
        }
        if let Some(port) = self.api_port {
            options.api.port = port;
        }
        if self.no_api {
            options.api.enabled = false;
        }
        if let Some(level) = &self.log_level {
            options.observability.log_level = level.clone();
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = match cli.options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("relay-node: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&options.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        network = %options.network.preset,
        api_enabled = options.api.enabled,
        "relay-node starting"
    );

    let mut deps = Dependencies::new();
    // Subscribed before bootstrap so a stop request during startup is not lost.
    let stop = deps.shutdown_signal.subscribe();

    if let Err(e) = deps.bootstrap(&options).await {
        tracing::error!(stage = %e.stage, kind = ?e.kind(), error = %e, "Bootstrap failed");
        if let Err(e) = deps.shutdown().await {
            tracing::error!(error = %e, "Shutdown after failed bootstrap was incomplete");
        }
        return ExitCode::FAILURE;
    }

    let reason = wait_for_stop(stop).await;
    tracing::info!(reason = ?reason, "Stopping");

    match deps.shutdown().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Teardown failures never block exit; they are already logged per component.
            tracing::error!(error = %e, "Shutdown finished with errors");
            ExitCode::FAILURE
        }
    }
}
