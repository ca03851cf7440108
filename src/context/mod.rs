//! Request correlation.
//!
//! # Responsibilities
//! - Create a [`CorrelationContext`] at ingress and derive child contexts for
//!   sub-operations
//! - Serialize it to a flat transport document for bus messages
//! - Attach it to the current thread's logging context for the duration of a
//!   unit of work
//!
//! # Data Flow
//! ```text
//! HTTP headers ──▶ CorrelationContext ──derive_child──▶ bus envelope (_context)
//!                        │                                      │
//!                        └── attach (guard / per-poll) ◀── extract_context
//! ```

pub mod correlation;
pub mod envelope;
pub mod logging;

pub use correlation::{keys, ContextError, CorrelationContext};
pub use envelope::{enrich_message, extract_context};
pub use logging::{LoggingGuard, WithCorrelation};
