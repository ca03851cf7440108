//! Runs blocking work off the async runtime with a correlation context
//! attached on both sides of the hop.
//!
//! # Data Flow
//! ```text
//! caller task                         blocking thread
//! ───────────                         ───────────────
//! attach ctx (per poll)
//! submit ───────────────────────────▶ attach ctx
//!                                     work(&interrupt)
//!                                     detach ctx (always, via guard)
//! ◀──────────────────────────────── (result, interrupted?)
//! classify error / Interrupted / Internal
//! detach ctx
//! ```

use std::time::Instant;

use crate::context::{CorrelationContext, WithCorrelation};
use crate::error::{ErrorKind, ServiceError};
use crate::execution::pool::{Interrupt, PoolError, WorkerPool};
use crate::observability::metrics;

/// Executes blocking closures on a [`WorkerPool`] and converts their errors
/// to [`ServiceError`].
///
/// Breaker errors never originate here; wrap calls in
/// `CircuitBreaker::execute` to get admission control and timeouts.
#[derive(Debug, Clone)]
pub struct BlockingExecutionBridge {
    pool: WorkerPool,
}

impl BlockingExecutionBridge {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run `work` on the pool with `ctx` attached to the logging context of
    /// the thread that runs it.
    ///
    /// An `Err` from `work` goes through `classify`, unless the work was
    /// interrupted, in which case the result is [`ErrorKind::Interrupted`].
    /// A panic in `work` becomes [`ErrorKind::Internal`].
    pub async fn execute_blocking<T, E, W, C>(
        &self,
        work: W,
        ctx: &CorrelationContext,
        classify: C,
    ) -> Result<T, ServiceError>
    where
        W: FnOnce(&Interrupt) -> Result<T, E> + Send + 'static,
        C: FnOnce(E) -> ServiceError,
        T: Send + 'static,
        E: Send + 'static,
    {
        let worker_ctx = ctx.clone();
        let submitted = self
            .pool
            .submit(move |interrupt| {
                let _guard = worker_ctx.attach_logging_context();
                tracing::debug!("Executing blocking operation");
                let started = Instant::now();
                let result = work(interrupt);
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Blocking operation completed"
                );
                (result, interrupt.is_interrupted())
            })
            .with_correlation(ctx)
            .await;

        let outcome = match submitted {
            Ok((Ok(value), _)) => Ok(value),
            Ok((Err(_), true)) | Err(PoolError::Interrupted) | Err(PoolError::Closed) => {
                Err(ServiceError::interrupted("Blocking operation was interrupted"))
            }
            Ok((Err(e), false)) => Err(reclassify(classify(e))),
            Err(PoolError::Panicked(msg)) => {
                tracing::error!(correlation_id = %ctx.correlation_id(), panic = %msg, "Blocking operation panicked");
                Err(ServiceError::internal("Blocking operation failed unexpectedly"))
            }
        };

        metrics::record_blocking(match &outcome {
            Ok(_) => "success",
            Err(e) if e.kind() == ErrorKind::Interrupted => "interrupted",
            Err(_) => "failure",
        });

        outcome.map_err(|e| e.with_correlation_id(ctx.correlation_id()))
    }
}

/// Breaker errors are reserved for the breaker itself.
fn reclassify(err: ServiceError) -> ServiceError {
    if err.is_breaker_error() {
        tracing::warn!(kind = %err.kind(), "Classifier produced a breaker error; reporting as operation failure");
        ServiceError::operation_failed(500, err.message())
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::context::logging;
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug)]
    struct DomainError(&'static str);

    fn bridge(pool_size: usize) -> BlockingExecutionBridge {
        BlockingExecutionBridge::new(WorkerPool::new(&WorkerConfig {
            pool_size,
            ..WorkerConfig::default()
        }))
    }

    fn to_bad_request(e: DomainError) -> ServiceError {
        ServiceError::bad_request(e.0)
    }

    #[tokio::test]
    async fn test_work_sees_context() {
        let bridge = bridge(2);
        let ctx = CorrelationContext::create().with_user_id("7");
        let expected = ctx.correlation_id().to_string();

        let seen = bridge
            .execute_blocking(
                |_| Ok::<_, DomainError>(logging::current().map(|f| (f.correlation_id, f.user_id))),
                &ctx,
                to_bad_request,
            )
            .await
            .unwrap();

        assert_eq!(seen, Some((expected, Some("7".to_string()))));
        assert!(logging::current().is_none());
    }

    #[test]
    fn test_domain_error_classified_and_context_detached() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(1)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let bridge = bridge(1);
            let ctx = CorrelationContext::create();

            let err = bridge
                .execute_blocking(
                    |_| -> Result<(), DomainError> { Err(DomainError("name is required")) },
                    &ctx,
                    to_bad_request,
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest);
            assert_eq!(err.status(), 400);
            assert_eq!(err.message(), "name is required");
            assert_eq!(err.correlation_id(), Some(ctx.correlation_id()));

            // Same single blocking thread; nothing left attached.
            let next = CorrelationContext::create();
            let leftover = bridge
                .execute_blocking(|_| Ok::<_, DomainError>(logging::current()), &next, to_bad_request)
                .await
                .unwrap();
            assert_eq!(leftover.map(|f| f.correlation_id == ctx.correlation_id()), Some(false));

            let after = bridge
                .pool()
                .submit(|_| logging::current())
                .await
                .unwrap();
            assert!(after.is_none());
        });
    }

    #[tokio::test]
    async fn test_panic_becomes_internal() {
        let bridge = bridge(1);
        let err = bridge
            .execute_blocking(
                |_| -> Result<u8, DomainError> { panic!("index out of bounds") },
                &CorrelationContext::create(),
                to_bad_request,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_interrupted_work_is_not_classified() {
        let bridge = bridge(1);
        let pool = bridge.pool().clone();

        let ctx = CorrelationContext::create();
        let call = bridge.execute_blocking(
            |interrupt| -> Result<(), DomainError> {
                interrupt
                    .sleep(Duration::from_secs(5))
                    .map_err(|_| DomainError("should not be classified"))
            },
            &ctx,
            to_bad_request,
        );
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            pool.shutdown();
        };
        let (result, ()) = tokio::join!(call, shutdown);

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_classifier_cannot_forge_breaker_errors() {
        let bridge = bridge(1);
        let err = bridge
            .execute_blocking(
                |_| -> Result<(), DomainError> { Err(DomainError("db")) },
                &CorrelationContext::create(),
                |_| ServiceError::breaker_open("database"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
    }

    #[tokio::test]
    async fn test_breaker_timeout_interrupts_orphan() {
        let bridge = bridge(1);
        let breaker = CircuitBreaker::new("database", CircuitBreakerConfig::new(3, 1, 50, 60_000));
        let ctx = CorrelationContext::create();
        let (tx, rx) = mpsc::channel();

        let started = Instant::now();
        let err = breaker
            .execute(|| {
                bridge.execute_blocking(
                    move |interrupt| -> Result<(), DomainError> {
                        let slept = interrupt.sleep(Duration::from_millis(500));
                        let _ = tx.send(slept);
                        Ok(())
                    },
                    &ctx,
                    to_bad_request,
                )
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BreakerTimeout);
        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(breaker.metrics().failure_count, 1);

        let observed = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(matches!(observed, Ok(Err(_))));
    }
}
