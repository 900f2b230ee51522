//! Inference Relay
//!
//! A request-serializing proxy in front of a remote text-generation endpoint
//! that is sometimes unavailable, rate-limited, or slow to cold-start.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    INFERENCE RELAY                    │
//!                     │                                                       │
//!   POST /api/chat/   │  ┌─────────┐    ┌─────────┐    ┌──────────────────┐  │
//!   ──────────────────┼─▶│  http   │───▶│ gateway │───▶│  dispatch queue  │  │
//!                     │  │ server  │    │validate │    │  (FIFO, mpsc)    │  │
//!                     │  └─────────┘    │ + wait  │    └────────┬─────────┘  │
//!                     │       ▲         └────▲────┘             │            │
//!                     │       │              │                  ▼            │
//!                     │       │         oneshot reply   ┌──────────────────┐ │
//!   {"response"} /    │       │              └──────────│  single worker   │─┼──▶ Inference
//!   {"error"}         │       │                         │ retry / backoff  │◀┼─── endpoint
//!   ◀─────────────────┼───────┘                         └──────────────────┘ │
//!                     │                                                       │
//!                     │  config · observability · lifecycle · admin           │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use inference_relay::config::load_or_default;
use inference_relay::lifecycle::{signals, startup, Shutdown};
use inference_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "inference-relay")]
#[command(about = "Serializing proxy for a remote text-generation endpoint", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("inference-relay v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        max_retries = config.dispatch.max_retries,
        max_wait_ms = config.gateway.max_wait_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    startup::launch(config, listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
