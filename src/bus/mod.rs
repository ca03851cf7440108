//! In-process asynchronous request/reply message bus.
//!
//! # Responsibilities
//! - Route JSON messages to the consumer registered at an address
//! - Deliver exactly one reply (value or failure code) per request
//! - Bound how long a requester waits for the reply
//!
//! # Data Flow
//! ```text
//! request(address, body)
//!     → consumer queue (bounded mpsc)
//!     → consumer loop spawns handler(body)
//!     → reply via oneshot
//!     ← Ok(Value) | Err(BusError::Failed { code, message })
//! ```
//!
//! # Design Decisions
//! - Each request gets its own handler task, so a slow request does not
//!   hold up the queue behind it
//! - Correlation context rides inside the body (see `context::envelope`);
//!   the bus itself is context-agnostic

pub mod consumers;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::config::BusConfig;
use crate::context::{enrich_message, CorrelationContext};
use crate::error::ServiceError;
use crate::observability::metrics;

pub type Body = Map<String, Value>;

type Handler = Arc<dyn Fn(Body) -> BoxFuture<'static, Result<Value, ServiceError>> + Send + Sync>;

/// Bus-level failure of a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("No handler registered for address '{0}'")]
    NoHandler(String),

    #[error("Timed out after {timeout_ms}ms waiting for a reply from '{address}'")]
    Timeout { address: String, timeout_ms: u64 },

    /// The consumer replied with a failure.
    #[error("{message}")]
    Failed { code: u16, message: String },

    #[error("Consumer at '{0}' went away before replying")]
    Closed(String),
}

impl BusError {
    fn outcome(&self) -> &'static str {
        match self {
            BusError::NoHandler(_) => "no_handler",
            BusError::Timeout { .. } => "timeout",
            BusError::Failed { .. } => "failed",
            BusError::Closed(_) => "closed",
        }
    }
}

impl From<BusError> for ServiceError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::Failed { code, message } => ServiceError::from_status(code, message),
            BusError::Timeout { .. } => ServiceError::operation_failed(504, e.to_string()),
            BusError::NoHandler(_) | BusError::Closed(_) => ServiceError::operation_failed(503, e.to_string()),
        }
    }
}

impl From<ServiceError> for BusError {
    fn from(e: ServiceError) -> Self {
        BusError::Failed {
            code: e.status(),
            message: e.message().to_string(),
        }
    }
}

struct Envelope {
    body: Body,
    reply: oneshot::Sender<Result<Value, BusError>>,
}

/// Cloneable handle to the bus.
#[derive(Clone)]
pub struct EventBus {
    consumers: Arc<DashMap<String, mpsc::Sender<Envelope>>>,
    send_timeout: Duration,
    capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("addresses", &self.addresses())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

impl EventBus {
    pub fn new(config: &BusConfig) -> Self {
        Self {
            consumers: Arc::new(DashMap::new()),
            send_timeout: config.send_timeout(),
            capacity: config.channel_capacity.max(1),
        }
    }

    /// Register `handler` at `address`, replacing any previous consumer.
    ///
    /// Must be called from within a tokio runtime; the consumer loop runs
    /// until the address is unregistered or the bus is closed.
    pub fn register<F, Fut>(&self, address: &str, handler: F)
    where
        F: Fn(Body) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |body| handler(body).boxed());
        let (tx, mut rx) = mpsc::channel::<Envelope>(self.capacity);

        if self.consumers.insert(address.to_string(), tx).is_some() {
            tracing::warn!(address = %address, "Replaced existing bus consumer");
        }

        let address = address.to_string();
        tokio::spawn(async move {
            tracing::info!(address = %address, "Bus consumer registered");
            while let Some(envelope) = rx.recv().await {
                let reply = handler(envelope.body);
                tokio::spawn(async move {
                    let result = reply.await.map_err(BusError::from);
                    let _ = envelope.reply.send(result);
                });
            }
            tracing::debug!(address = %address, "Bus consumer stopped");
        });
    }

    pub fn unregister(&self, address: &str) -> bool {
        self.consumers.remove(address).is_some()
    }

    pub fn has_consumer(&self, address: &str) -> bool {
        self.consumers.contains_key(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<_> = self.consumers.iter().map(|e| e.key().clone()).collect();
        addresses.sort();
        addresses
    }

    /// Stop every consumer loop. Pending requests fail with `Closed`.
    pub fn close(&self) {
        self.consumers.clear();
    }

    /// Send `body` to `address` and wait for the reply.
    pub async fn request(&self, address: &str, body: Body) -> Result<Value, BusError> {
        let result = self.dispatch(address, body).await;
        metrics::record_bus(address, result.as_ref().map_or_else(BusError::outcome, |_| "success"));
        if let Err(e) = &result {
            tracing::debug!(address = %address, error = %e, "Bus request failed");
        }
        result
    }

    /// [`EventBus::request`] with `ctx` embedded in the body.
    pub async fn request_with_context(
        &self,
        address: &str,
        ctx: &CorrelationContext,
        body: Body,
    ) -> Result<Value, BusError> {
        self.request(address, enrich_message(ctx, &body)).await
    }

    async fn dispatch(&self, address: &str, body: Body) -> Result<Value, BusError> {
        let sender = self
            .consumers
            .get(address)
            .map(|s| s.value().clone())
            .ok_or_else(|| BusError::NoHandler(address.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope { body, reply: reply_tx };

        let round_trip = async {
            sender
                .send(envelope)
                .await
                .map_err(|_| BusError::Closed(address.to_string()))?;
            reply_rx.await.map_err(|_| BusError::Closed(address.to_string()))?
        };

        match tokio::time::timeout(self.send_timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout {
                address: address.to_string(),
                timeout_ms: self.send_timeout.as_millis() as u64,
            }),
        }
    }
}
