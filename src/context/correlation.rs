//! Correlation context carried through every hop of a request.
//!
//! A context is an immutable value. The `with_*` builders and
//! [`CorrelationContext::derive_child`] return a new value; clones that have
//! already been handed to another task or thread are never modified
//! (copy-on-write through `Arc::make_mut`).

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::logging::{self, LoggingGuard};

/// Reserved keys of the transport document.
pub mod keys {
    pub const CORRELATION_ID: &str = "correlationId";
    pub const REQUEST_ID: &str = "requestId";
    pub const USER_ID: &str = "userId";
    pub const TENANT_ID: &str = "tenantId";
    pub const TRACE_ID: &str = "traceId";
    pub const SPAN_ID: &str = "spanId";
    pub const PARENT_SPAN_ID: &str = "parentSpanId";
    pub const SESSION_ID: &str = "sessionId";
    pub const OPERATION: &str = "operation";
    pub const SOURCE_IP: &str = "sourceIp";
    pub const USER_AGENT: &str = "userAgent";
    pub const START_TIME: &str = "startTime";
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("transport document must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq)]
struct Fields {
    correlation_id: String,
    request_id: String,
    user_id: Option<String>,
    tenant_id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    parent_span_id: Option<String>,
    session_id: Option<String>,
    operation: Option<String>,
    source_ip: Option<String>,
    user_agent: Option<String>,
    /// Epoch millis at creation.
    start_time: i64,
    attributes: BTreeMap<String, Value>,
}

/// Request-scoped identity and tracing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationContext {
    inner: Arc<Fields>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl CorrelationContext {
    /// Fresh context with new correlation and request identifiers.
    pub fn create() -> Self {
        Self {
            inner: Arc::new(Fields {
                correlation_id: new_id(),
                request_id: new_id(),
                user_id: None,
                tenant_id: None,
                trace_id: None,
                span_id: None,
                parent_span_id: None,
                session_id: None,
                operation: None,
                source_ip: None,
                user_agent: None,
                start_time: now_millis(),
                attributes: BTreeMap::new(),
            }),
        }
    }

    /// Context for a sub-operation.
    ///
    /// Shares the correlation id and start time, gets a fresh request id and
    /// span id, and records this context's span as its parent.
    pub fn derive_child(&self, operation: &str) -> Self {
        let mut fields = (*self.inner).clone();
        fields.request_id = new_id();
        fields.parent_span_id = self.inner.span_id.clone();
        fields.span_id = Some(new_id());
        fields.operation = Some(operation.to_string());
        Self {
            inner: Arc::new(fields),
        }
    }

    fn edit(mut self, f: impl FnOnce(&mut Fields)) -> Self {
        f(Arc::make_mut(&mut self.inner));
        self
    }

    /// Replace the correlation id, e.g. with an inbound `X-Correlation-ID`.
    /// Blank values are ignored.
    pub fn with_correlation_id(self, id: impl Into<String>) -> Self {
        match non_blank(id.into()) {
            Some(id) => self.edit(|f| f.correlation_id = id),
            None => self,
        }
    }

    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        let v = user_id.into();
        self.edit(|f| f.user_id = Some(v))
    }

    pub fn with_tenant_id(self, tenant_id: impl Into<String>) -> Self {
        let v = tenant_id.into();
        self.edit(|f| f.tenant_id = Some(v))
    }

    pub fn with_trace_id(self, trace_id: impl Into<String>) -> Self {
        let v = trace_id.into();
        self.edit(|f| f.trace_id = Some(v))
    }

    pub fn with_span_id(self, span_id: impl Into<String>) -> Self {
        let v = span_id.into();
        self.edit(|f| f.span_id = Some(v))
    }

    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        let v = session_id.into();
        self.edit(|f| f.session_id = Some(v))
    }

    pub fn with_source_ip(self, source_ip: impl Into<String>) -> Self {
        let v = source_ip.into();
        self.edit(|f| f.source_ip = Some(v))
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        let v = user_agent.into();
        self.edit(|f| f.user_agent = Some(v))
    }

    /// Add an extension attribute. Reserved keys update the matching field
    /// instead; empty keys and nulls are ignored.
    pub fn with_attribute(self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if key.is_empty() || value.is_null() {
            return self;
        }
        if is_reserved(key) {
            return match value {
                Value::String(s) => self.with_reserved(key, s),
                Value::Number(n) if key == keys::START_TIME => match n.as_i64() {
                    Some(ms) => self.edit(|f| f.start_time = ms),
                    None => self,
                },
                _ => self,
            };
        }
        let key = key.to_string();
        self.edit(|f| {
            f.attributes.insert(key, value);
        })
    }

    fn with_reserved(self, key: &str, value: String) -> Self {
        match key {
            keys::CORRELATION_ID => self.with_correlation_id(value),
            keys::REQUEST_ID => match non_blank(value) {
                Some(v) => self.edit(|f| f.request_id = v),
                None => self,
            },
            keys::USER_ID => self.with_user_id(value),
            keys::TENANT_ID => self.with_tenant_id(value),
            keys::TRACE_ID => self.with_trace_id(value),
            keys::SPAN_ID => self.with_span_id(value),
            keys::PARENT_SPAN_ID => self.edit(|f| f.parent_span_id = Some(value)),
            keys::SESSION_ID => self.with_session_id(value),
            keys::OPERATION => self.edit(|f| f.operation = Some(value)),
            keys::SOURCE_IP => self.with_source_ip(value),
            keys::USER_AGENT => self.with_user_agent(value),
            _ => self,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.inner.user_id.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.inner.tenant_id.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.inner.trace_id.as_deref()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.inner.span_id.as_deref()
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.inner.parent_span_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.inner.session_id.as_deref()
    }

    pub fn operation(&self) -> Option<&str> {
        self.inner.operation.as_deref()
    }

    pub fn source_ip(&self) -> Option<&str> {
        self.inner.source_ip.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.inner.user_agent.as_deref()
    }

    pub fn start_time_ms(&self) -> i64 {
        self.inner.start_time
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.inner.attributes.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.inner.attributes
    }

    /// Milliseconds since the context was created. Never negative.
    pub fn elapsed_ms(&self) -> u64 {
        (now_millis() - self.inner.start_time).max(0) as u64
    }

    /// Flat key/value document for crossing a process or transport boundary.
    pub fn to_transport_document(&self) -> Value {
        let f = &*self.inner;
        let mut doc = Map::new();
        for (k, v) in &f.attributes {
            doc.insert(k.clone(), v.clone());
        }
        doc.insert(keys::CORRELATION_ID.into(), Value::from(f.correlation_id.clone()));
        doc.insert(keys::REQUEST_ID.into(), Value::from(f.request_id.clone()));
        doc.insert(keys::START_TIME.into(), Value::from(f.start_time));

        let optional = [
            (keys::USER_ID, &f.user_id),
            (keys::TENANT_ID, &f.tenant_id),
            (keys::TRACE_ID, &f.trace_id),
            (keys::SPAN_ID, &f.span_id),
            (keys::PARENT_SPAN_ID, &f.parent_span_id),
            (keys::SESSION_ID, &f.session_id),
            (keys::OPERATION, &f.operation),
            (keys::SOURCE_IP, &f.source_ip),
            (keys::USER_AGENT, &f.user_agent),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                doc.insert(key.into(), Value::from(v.clone()));
            }
        }
        Value::Object(doc)
    }

    /// Rebuild a context from [`CorrelationContext::to_transport_document`].
    ///
    /// Missing or blank identifiers are regenerated so the result always has
    /// a correlation id and a request id.
    pub fn from_transport_document(doc: &Value) -> Result<Self, ContextError> {
        let map = doc.as_object().ok_or(ContextError::NotAnObject)?;

        let base = Self::create();
        let generated = (
            base.correlation_id().to_string(),
            base.request_id().to_string(),
        );
        let mut ctx = base;
        for (key, value) in map {
            ctx = ctx.with_attribute(key, value.clone());
        }

        if ctx.correlation_id() == generated.0 {
            tracing::debug!(correlation_id = %ctx.correlation_id(), "Inbound context had no correlation id; generated one");
        }
        if ctx.request_id() == generated.1 {
            tracing::debug!(request_id = %ctx.request_id(), "Inbound context had no request id; generated one");
        }
        Ok(ctx)
    }

    /// `tracing` span carrying this context's identifiers.
    pub fn span(&self) -> tracing::Span {
        let f = &*self.inner;
        tracing::info_span!(
            "correlation",
            correlation_id = %f.correlation_id,
            request_id = %f.request_id,
            user_id = f.user_id.as_deref().unwrap_or(""),
            tenant_id = f.tenant_id.as_deref().unwrap_or(""),
            trace_id = f.trace_id.as_deref().unwrap_or(""),
        )
    }

    /// Attach this context to the current thread's logging context until the
    /// returned guard is dropped.
    pub fn attach_logging_context(&self) -> LoggingGuard {
        logging::attach(self)
    }

    /// Emit a structured event with this context attached for its duration.
    pub fn log_event(&self, event: &str, data: Value) {
        let _guard = self.attach_logging_context();
        tracing::info!(event = %event, data = %data, context = %self, "Context event");
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(
        key,
        keys::CORRELATION_ID
            | keys::REQUEST_ID
            | keys::USER_ID
            | keys::TENANT_ID
            | keys::TRACE_ID
            | keys::SPAN_ID
            | keys::PARENT_SPAN_ID
            | keys::SESSION_ID
            | keys::OPERATION
            | keys::SOURCE_IP
            | keys::USER_AGENT
            | keys::START_TIME
    )
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::create()
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "correlation_id={} request_id={} user_id={}",
            self.inner.correlation_id,
            self.inner.request_id,
            self.inner.user_id.as_deref().unwrap_or("-"),
        )
    }
}
