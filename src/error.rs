//! Typed service errors.
//!
//! Every failure that leaves the resilience core is a [`ServiceError`]. The
//! kind tells a caller whether retrying makes sense; the status is what the
//! HTTP layer writes on the wire.

use std::fmt;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Circuit breaker denied admission; the operation never ran.
    BreakerOpen,
    /// Operation was admitted but did not finish within the per-call timeout.
    BreakerTimeout,
    /// The wrapped work failed and was classified.
    OperationFailed,
    /// The wrapped work was cancelled or interrupted mid-execution.
    Interrupted,
    /// The whole request outlived the server's request timeout.
    Timeout,
    NotFound,
    BadRequest,
    Gone,
    Internal,
}

impl ErrorKind {
    /// Default HTTP status for this kind.
    pub fn default_status(self) -> u16 {
        match self {
            ErrorKind::BreakerOpen => 503,
            ErrorKind::BreakerTimeout => 504,
            ErrorKind::Interrupted => 503,
            ErrorKind::Timeout => 504,
            ErrorKind::OperationFailed => 500,
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::Gone => 410,
            ErrorKind::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BreakerOpen => "breaker_open",
            ErrorKind::BreakerTimeout => "breaker_timeout",
            ErrorKind::OperationFailed => "operation_failed",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Gone => "gone",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error carried by every future returned from the resilience core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    kind: ErrorKind,
    status: u16,
    message: String,
    correlation_id: Option<String>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.default_status(),
            message: message.into(),
            correlation_id: None,
        }
    }

    /// A classified operation failure with an explicit status.
    pub fn operation_failed(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationFailed, message).with_status(status)
    }

    pub fn breaker_open(name: &str) -> Self {
        Self::new(
            ErrorKind::BreakerOpen,
            format!("Circuit breaker '{}' is OPEN", name),
        )
    }

    pub fn breaker_timeout(timeout_ms: u64) -> Self {
        Self::new(
            ErrorKind::BreakerTimeout,
            format!("Operation timed out after {}ms", timeout_ms),
        )
    }

    pub fn request_timeout(timeout_ms: u64) -> Self {
        Self::new(ErrorKind::Timeout, format!("Request timed out after {}ms", timeout_ms))
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Interrupted, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn gone(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Gone, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Rebuild an error from a status received over a transport, e.g. a bus
    /// reply failure code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            400 => ErrorKind::BadRequest,
            404 => ErrorKind::NotFound,
            410 => ErrorKind::Gone,
            _ => ErrorKind::OperationFailed,
        };
        Self::new(kind, message).with_status(status)
    }

    /// Override the status while keeping the kind.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Whether a caller may reasonably retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::BreakerOpen | ErrorKind::BreakerTimeout | ErrorKind::Interrupted | ErrorKind::Timeout
        )
    }

    /// Errors synthesized by a circuit breaker rather than by the work itself.
    pub fn is_breaker_error(&self) -> bool {
        matches!(self.kind, ErrorKind::BreakerOpen | ErrorKind::BreakerTimeout)
    }
}
