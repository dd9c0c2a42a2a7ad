//! ==============================================================================
//! main.rs - firewatch host entry point
//! ==============================================================================
//!
//! purpose:
//!     ground station for a fire-risk sensor node. the node (esp32 / lora
//!     receiver) prints frames on a usb serial link; this host keeps the
//!     latest readings in memory and serves them as json to the map front-end.
//!
//! responsibilities:
//!     - load station.toml (or defaults)
//!     - start the serial reader on a blocking worker
//!     - serve the http api
//!     - on ctrl-c: stop the web server, then stop the reader (bounded wait)
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                       rust host (this file)                  │
//!     │  ┌──────────────────┐                 ┌──────────────────┐  │
//!     │  │  serial reader   │                 │    web server    │  │
//!     │  │ (blocking worker)│                 │   (port 5000)    │  │
//!     │  └────────┬─────────┘                 └────────┬─────────┘  │
//!     │           │ push                      snapshot │            │
//!     │           │        ┌──────────────┐            │            │
//!     │           └──────> │ series store │ <──────────┘            │
//!     │                    │  (RwLock)    │                         │
//!     │                    └──────────────┘                         │
//!     └───────────────────────────┬─────────────────────────────────┘
//!                                 │ DATA <t> <h> <risk> ENDATA
//!                          ┌──────┴──────┐
//!                          │ /dev/ttyUSB0│
//!                          └─────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use firewatch_host::{api, config, lifecycle, query, store};

#[derive(Debug, Parser)]
#[command(version, about = "Serial fire-risk sensor host")]
struct Cli {
    /// Path to station.toml (default: config/station.toml, then ../config/station.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // startup banner
    println!("===========================================================");
    println!("  Firewatch Host - serial sensor ground station");
    println!("===========================================================");

    // step 1: load configuration
    let config = match &cli.config {
        Some(path) => config::HostConfig::load(path)?,
        None => config::HostConfig::load_or_default(),
    };
    init_tracing(&config.logging.level);
    config.print_summary();

    // step 2: bind first so a busy port fails before the reader owns the device
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;

    // step 3: the store shared by reader and api, reader in background
    let store = store::SeriesStore::new(config.buffer.capacity);
    let ingest = lifecycle::IngestService::start(&config, store.clone());

    // step 4: serve until ctrl-c
    let query = query::StationQuery::new(config.station, store, ingest.status());
    tracing::info!(addr = %config.server.bind, "API live");

    let served = api::run_server(listener, query, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
        tracing::info!("Shutdown requested");
    })
    .await;

    // step 5: stop the reader; at most one read timeout plus slack
    let grace = config.serial.read_timeout() * 2;
    match ingest.shutdown(grace).await {
        Ok(state) => tracing::info!(?state, "Stopped reading from {}", config.serial.path),
        Err(e) => tracing::warn!(error = %e, "Serial reader shutdown incomplete"),
    }

    served
}
