//! Per-thread logging context.
//!
//! Attaching a [`CorrelationContext`] enters its `tracing` span and pushes
//! its identifiers onto a thread-local stack so that both structured log
//! output and [`current`] see them. The returned [`LoggingGuard`] restores the
//! previous state on drop, including on early return or panic unwind.
//!
//! Futures use [`WithCorrelation::with_correlation`], which attaches around
//! each poll so that no context is left behind on a runtime worker thread
//! between polls.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::context::correlation::CorrelationContext;

/// Identifiers visible to log output while a context is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFields {
    pub correlation_id: String,
    pub request_id: String,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub trace_id: Option<String>,
}

impl From<&CorrelationContext> for LogFields {
    fn from(ctx: &CorrelationContext) -> Self {
        Self {
            correlation_id: ctx.correlation_id().to_string(),
            request_id: ctx.request_id().to_string(),
            user_id: ctx.user_id().map(str::to_string),
            tenant_id: ctx.tenant_id().map(str::to_string),
            trace_id: ctx.trace_id().map(str::to_string),
        }
    }
}

thread_local! {
    static STACK: RefCell<Vec<LogFields>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a context attached to the current thread. Not `Send`: it must be
/// dropped on the thread that created it.
#[must_use = "the context is detached as soon as the guard is dropped"]
pub struct LoggingGuard {
    _span: tracing::span::EnteredSpan,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl LoggingGuard {
    /// Detach now rather than at end of scope.
    pub fn detach(self) {
        drop(self)
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        STACK.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").field("depth", &self.depth).finish()
    }
}

pub(crate) fn attach(ctx: &CorrelationContext) -> LoggingGuard {
    let depth = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(LogFields::from(ctx));
        depth
    });
    LoggingGuard {
        _span: ctx.span().entered(),
        depth,
        _not_send: PhantomData,
    }
}

/// Identifiers attached to the current thread, innermost first.
pub fn current() -> Option<LogFields> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

pub fn is_attached() -> bool {
    STACK.with(|stack| !stack.borrow().is_empty())
}

/// Drop anything still attached to this thread.
///
/// Used where a unit of work is handed a thread it does not own and must
/// leave it clean.
pub fn clear() {
    STACK.with(|stack| stack.borrow_mut().clear());
}

/// A future with a correlation context attached during every poll.
#[derive(Debug)]
pub struct Correlated<F> {
    inner: Pin<Box<F>>,
    ctx: CorrelationContext,
}

impl<F: Future> Future for Correlated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = attach(&this.ctx);
        this.inner.as_mut().poll(cx)
    }
}

pub trait WithCorrelation: Future + Sized {
    fn with_correlation(self, ctx: &CorrelationContext) -> Correlated<Self> {
        Correlated {
            inner: Box::pin(self),
            ctx: ctx.clone(),
        }
    }
}

impl<F: Future> WithCorrelation for F {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_attaches_and_restores() {
        assert!(current().is_none());
        let outer = CorrelationContext::create().with_user_id("alice");
        let inner = outer.derive_child("nested");

        {
            let _g1 = outer.attach_logging_context();
            assert_eq!(current().unwrap().correlation_id, outer.correlation_id());
            {
                let _g2 = inner.attach_logging_context();
                assert_eq!(current().unwrap().request_id, inner.request_id());
            }
            assert_eq!(current().unwrap().request_id, outer.request_id());
            assert_eq!(current().unwrap().user_id.as_deref(), Some("alice"));
        }
        assert!(!is_attached());
    }

    #[test]
    fn test_detached_on_panic() {
        let ctx = CorrelationContext::create();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g = ctx.attach_logging_context();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn test_clear_empties_stack() {
        let ctx = CorrelationContext::create();
        let guard = ctx.attach_logging_context();
        clear();
        assert!(!is_attached());
        guard.detach();
        assert!(!is_attached());
    }

    #[tokio::test]
    async fn test_future_sees_context_only_while_polled() {
        let ctx = CorrelationContext::create();
        let expected = ctx.correlation_id().to_string();

        let seen = async {
            tokio::task::yield_now().await;
            current().map(|f| f.correlation_id)
        }
        .with_correlation(&ctx)
        .await;

        assert_eq!(seen.as_deref(), Some(expected.as_str()));
        assert!(current().is_none());
    }
}
