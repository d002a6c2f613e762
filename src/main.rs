//! Cluster node server.
//!
//! Serves authenticated HTTP endpoints for remote execution control and
//! keeps track of which peer nodes in the cluster are alive.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                 NODE SERVER                  │
//!   HTTP client   │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────┼─▶│   net   │──▶│   http   │──▶│ handlers  │  │
//!                 │  │listener │   │ + auth   │   │ / /api ...│  │
//!                 │  └─────────┘   └──────────┘   └───────────┘  │
//!                 │                                              │
//!                 │  ┌──────────────┐        status probes       │
//!                 │  │   health     │────────────────────────────┼──▶ peer nodes
//!                 │  │  heartbeat   │                            │
//!                 │  └──────────────┘                            │
//!                 │  config · security · lifecycle · observability│
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use node_server::config::loader::load_config;
use node_server::config::schema::PeerConfig;
use node_server::lifecycle::{wait_for_signal, NodeServer};
use node_server::observability::{logging, metrics};
use node_server::{DetectionList, NodeConfig, SharedState};

#[derive(Parser)]
#[command(name = "node-server")]
#[command(about = "Cluster node server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.hostname`
    #[arg(long)]
    hostname: Option<String>,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `server.password_file`
    #[arg(long)]
    password_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };
    if let Some(hostname) = args.hostname {
        config.server.hostname = hostname;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.password_file.is_some() {
        config.server.password_file = args.password_file;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "node-server starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let detections = Arc::new(DetectionList::from_peers(
        config.peers.iter().map(PeerConfig::to_peer),
    ));
    let shared = SharedState::new(detections);
    let server = Arc::new(NodeServer::new(config, shared));

    let signal_server = server.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        let report = signal_server.stop().await;
        if !report.is_clean() {
            tracing::warn!(?report, "Shutdown finished with failures");
        }
    });

    let addr = server.start().await?;
    tracing::info!(address = %addr, "Serving");
    server.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
