//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Start the metrics exporter when enabled
//! - Bind the listener, build subsystems, and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds before subsystems start, so a taken port fails early
//! - On shutdown the HTTP server drains first, then the worker pool and bus close

use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::config::{validate_config, AppConfig, ConfigError};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bind the configured HTTP address.
pub async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

/// Run the service until `shutdown` is triggered.
pub async fn run(config: AppConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    if config.metrics.enabled {
        match config.metrics.bind_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.metrics.bind_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = bind(&config.server.bind_address).await?;
    serve(listener, config, shutdown).await
}

/// Serve on an already-bound `listener`.
pub async fn serve(listener: TcpListener, config: AppConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    tracing::info!(
        address = %listener.local_addr()?,
        worker_pool_size = config.worker.pool_size,
        breakers = config.circuit_breakers.len(),
        "Configuration loaded"
    );

    let state = AppState::new(config);
    HttpServer::new(state).run(listener, shutdown.signalled()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_config_fails_fast() {
        let mut config = AppConfig::default();
        config.worker.pool_size = 0;
        let err = run(config, Shutdown::new()).await.unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_bind_failure_names_address() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();
        let err = bind(&address).await.unwrap_err();
        assert!(err.to_string().contains(&address));
    }
}
