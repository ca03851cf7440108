//! Blocking work execution.
//!
//! # Responsibilities
//! - Bound the number of blocking closures running at once ([`WorkerPool`])
//! - Carry the correlation context onto the blocking thread and back
//!   ([`BlockingExecutionBridge`])
//! - Convert work failures into typed [`crate::error::ServiceError`]s
//!
//! # Design Decisions
//! - Orphaned work (caller gone, e.g. after a breaker timeout) is signalled
//!   through [`Interrupt`] and never forcibly stopped

pub mod bridge;
pub mod pool;

pub use bridge::BlockingExecutionBridge;
pub use pool::{Interrupt, Interrupted, PoolError, WorkerPool};
