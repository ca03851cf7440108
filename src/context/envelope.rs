//! Carrying a [`CorrelationContext`] inside a JSON message body.
//!
//! An enriched message keeps its own fields and gains three reserved ones:
//! the full transport document under `_context` plus the two identifiers at
//! top level for quick inspection.

use serde_json::{Map, Value};

use crate::context::correlation::CorrelationContext;

pub const CONTEXT_FIELD: &str = "_context";
pub const CORRELATION_ID_FIELD: &str = "_correlationId";
pub const REQUEST_ID_FIELD: &str = "_requestId";

/// Copy of `message` with `ctx` embedded. Existing reserved fields are
/// replaced.
pub fn enrich_message(ctx: &CorrelationContext, message: &Map<String, Value>) -> Map<String, Value> {
    let mut enriched = message.clone();
    enriched.insert(CONTEXT_FIELD.into(), ctx.to_transport_document());
    enriched.insert(CORRELATION_ID_FIELD.into(), Value::from(ctx.correlation_id()));
    enriched.insert(REQUEST_ID_FIELD.into(), Value::from(ctx.request_id()));
    enriched
}

/// Context embedded in `message`, or a fresh one when the message carries
/// none (or carries something that is not a transport document).
pub fn extract_context(message: &Map<String, Value>) -> CorrelationContext {
    match message.get(CONTEXT_FIELD) {
        Some(doc) => match CorrelationContext::from_transport_document(doc) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed message context");
                CorrelationContext::create()
            }
        },
        None => {
            let ctx = CorrelationContext::create();
            tracing::debug!(correlation_id = %ctx.correlation_id(), "Message carried no context; created one");
            ctx
        }
    }
}

pub fn has_context(message: &Map<String, Value>) -> bool {
    message.contains_key(CONTEXT_FIELD)
}

/// The message without the reserved envelope fields.
pub fn payload(message: &Map<String, Value>) -> Map<String, Value> {
    message
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), CONTEXT_FIELD | CORRELATION_ID_FIELD | REQUEST_ID_FIELD))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_enrich_then_extract() {
        let ctx = CorrelationContext::create().with_tenant_id("acme").derive_child("report");
        let message = object(json!({ "reportType": "sales", "limit": 10 }));

        let enriched = enrich_message(&ctx, &message);

        assert!(has_context(&enriched));
        assert_eq!(enriched["_correlationId"], json!(ctx.correlation_id()));
        assert_eq!(enriched["_requestId"], json!(ctx.request_id()));
        assert_eq!(enriched["reportType"], json!("sales"));
        assert_eq!(extract_context(&enriched), ctx);
        assert_eq!(payload(&enriched), message);
        assert!(!has_context(&message));
    }

    #[test]
    fn test_extract_without_context_creates_fresh() {
        let a = extract_context(&Map::new());
        let b = extract_context(&object(json!({ "_context": "garbage" })));
        assert!(!a.correlation_id().is_empty());
        assert_ne!(a.correlation_id(), b.correlation_id());
    }
}
