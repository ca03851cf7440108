//! Resilient API service (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (correlation middleware)
//!                         │
//!               ┌─────────┴──────────┐
//!               ▼                    ▼
//!         services (CRUD)       bus request ──▶ consumers (analytics, batch, health)
//!               │                    │                   │
//!               ▼                    ▼                   ▼
//!        circuit breaker      circuit breaker     blocking bridge
//!               │                                        │
//!               ▼                                        ▼
//!        blocking bridge ─────────────────────▶  worker pool (spawn_blocking)
//!
//!     Cross-cutting: config · observability · lifecycle · correlation context
//! ```

use clap::Parser;
use std::path::PathBuf;

use resilient_api::config::load_or_default;
use resilient_api::lifecycle::{signals, startup, Shutdown};
use resilient_api::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "resilient-api", version, about = "Resilient API service")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "APP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-api starting");

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());
    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
