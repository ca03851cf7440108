//! Bounded pool for blocking work.
//!
//! Work runs on tokio's blocking threads; a semaphore caps how many closures
//! from this pool run at once. Each closure receives an [`Interrupt`] it can
//! poll or sleep on. The interrupt is tripped when the awaiting future is
//! dropped (if `interrupt_orphans` is set) or when the pool is shut down.
//! A running thread is never killed; interruption is cooperative.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Returned by [`Interrupt::check`] and [`Interrupt::sleep`] once the work
/// has been asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation interrupted")]
pub struct Interrupted;

/// Cooperative interruption signal handed to blocking work.
#[derive(Debug, Clone)]
pub struct Interrupt {
    token: CancellationToken,
    handle: Option<Handle>,
}

impl Interrupt {
    fn new(token: CancellationToken) -> Self {
        Self {
            token,
            handle: Handle::try_current().ok(),
        }
    }

    /// An interrupt that is never tripped.
    pub fn never() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Block the current thread for `duration`, waking early on interrupt.
    ///
    /// Must be called from a blocking thread, never from async code.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        match &self.handle {
            Some(handle) => handle.block_on(async {
                tokio::select! {
                    _ = self.token.cancelled() => Err(Interrupted),
                    _ = tokio::time::sleep(duration) => Ok(()),
                }
            }),
            None => {
                std::thread::sleep(duration);
                self.check()
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("blocking operation was interrupted")]
    Interrupted,
    #[error("blocking operation panicked: {0}")]
    Panicked(String),
    #[error("worker pool is shut down")]
    Closed,
}

/// Bounded executor for blocking closures.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    in_flight: Arc<AtomicUsize>,
    root: CancellationToken,
    interrupt_orphans: bool,
    max_execute_time: Duration,
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl WorkerPool {
    pub fn new(config: &WorkerConfig) -> Self {
        let size = config.pool_size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            in_flight: Arc::new(AtomicUsize::new(0)),
            root: CancellationToken::new(),
            interrupt_orphans: config.interrupt_orphans,
            max_execute_time: Duration::from_millis(config.max_execute_time_ms),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Closures currently running on a blocking thread.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Run `work` on a blocking thread and wait for its result.
    ///
    /// Waits for a free slot first. Dropping the returned future before it
    /// resolves trips the work's [`Interrupt`] when the pool interrupts
    /// orphans; the closure still runs to completion on its thread.
    pub async fn submit<T, F>(&self, work: F) -> Result<T, PoolError>
    where
        F: FnOnce(&Interrupt) -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let token = self.root.child_token();
        let interrupt = Interrupt::new(token.clone());
        let orphan_guard = self.interrupt_orphans.then(|| token.clone().drop_guard());

        let in_flight = self.in_flight.clone();
        let max_execute_time = self.max_execute_time;
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _active = InFlight::enter(&in_flight);
            let started = Instant::now();
            let value = work(&interrupt);
            let elapsed = started.elapsed();
            if elapsed > max_execute_time {
                tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    limit_ms = max_execute_time.as_millis() as u64,
                    "Blocking operation exceeded max execute time"
                );
            }
            value
        });

        let joined = handle.await;
        if let Some(guard) = orphan_guard {
            let _ = guard.disarm();
        }

        match joined {
            Ok(value) => Ok(value),
            Err(e) if e.is_panic() => Err(PoolError::Panicked(panic_message(e.into_panic()))),
            Err(_) => Err(PoolError::Interrupted),
        }
    }

    /// Refuse new work and interrupt everything in flight.
    pub fn shutdown(&self) {
        self.permits.close();
        self.root.cancel();
        tracing::info!(in_flight = self.in_flight(), "Worker pool shut down");
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
