//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use resilient_api::config::{AppConfig, DelayConfig, LogFormat};
use resilient_api::lifecycle::{startup, Shutdown};

/// A running service on an ephemeral port. Shuts down on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn api(&self, path: &str) -> String {
        self.url(&format!("/api{}", path))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Configuration with simulated latencies cut to a few milliseconds.
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    let quick = DelayConfig::new(1, 2);
    config.service.list = quick;
    config.service.fetch = quick;
    config.service.create_user = quick;
    config.service.create_product = quick;
    config.service.update = quick;
    config.service.delete = quick;
    config.analytics.database_query_delay_ms = 5;
    config.analytics.file_processing_delay_ms = 5;
    config.bus.send_timeout_ms = 2_000;
    config.logging.format = LogFormat::Compact;
    config.logging.enable_request_logging = false;
    config
}

/// Start the real service with `config` and wait until it answers.
pub async fn spawn_server(config: AppConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = startup::serve(listener, config, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let server = TestServer { addr, client, shutdown };
    wait_until_ready(&server).await;
    server
}

async fn wait_until_ready(server: &TestServer) {
    for _ in 0..50 {
        if let Ok(res) = server.client.get(server.url("/health")).send().await {
            if res.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("service at {} did not become ready", server.addr);
}
