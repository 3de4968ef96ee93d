//! Trace-context carriers stored alongside outbox records
//!
//! A relay publishing the outbox later restores the carrier so the consumer's
//! spans join the trace of the request that produced the event.

use std::collections::BTreeMap;
use std::fmt::Debug;

/// Serializes the active trace context into a text carrier
pub trait SpanContextInjector: Send + Sync + Debug {
    fn inject(&self) -> String;
}

/// W3C Trace Context injector
///
/// With the `opentelemetry` feature the active span's context is propagated
/// through `TraceContextPropagator`. Otherwise, or when no OpenTelemetry span
/// is active, a fresh `traceparent` is generated so every record still carries
/// a correlation id.
///
/// The carrier is a JSON object, e.g.
/// `{"traceparent":"00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct W3cSpanContextInjector;

impl W3cSpanContextInjector {
    pub fn new() -> Self {
        Self
    }

    /// Format: {version}-{trace_id}-{parent_id}-{trace_flags}
    fn generate_traceparent() -> String {
        let trace_id = uuid::Uuid::new_v4().as_simple().to_string();
        let span_id = &uuid::Uuid::new_v4().as_simple().to_string()[..16];
        format!("00-{trace_id}-{span_id}-01")
    }

    #[cfg(feature = "opentelemetry")]
    fn current_carrier() -> BTreeMap<String, String> {
        use opentelemetry::propagation::TextMapPropagator;
        use opentelemetry_sdk::propagation::TraceContextPropagator;
        use std::collections::HashMap;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let cx = tracing::Span::current().context();
        let mut injector: HashMap<String, String> = HashMap::new();
        TraceContextPropagator::new().inject_context(&cx, &mut injector);

        let mut carrier: BTreeMap<String, String> = injector.into_iter().collect();
        carrier
            .entry("traceparent".to_string())
            .or_insert_with(Self::generate_traceparent);
        carrier
    }

    #[cfg(not(feature = "opentelemetry"))]
    fn current_carrier() -> BTreeMap<String, String> {
        BTreeMap::from([("traceparent".to_string(), Self::generate_traceparent())])
    }
}

impl SpanContextInjector for W3cSpanContextInjector {
    fn inject(&self) -> String {
        let carrier = Self::current_carrier();
        // A string map always serializes
        serde_json::to_string(&carrier).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Injector that returns a fixed carrier
#[derive(Debug, Clone, Default)]
pub struct StaticSpanContext(String);

impl StaticSpanContext {
    pub fn new(carrier: impl Into<String>) -> Self {
        Self(carrier.into())
    }

    /// Empty JSON carrier
    pub fn empty() -> Self {
        Self("{}".to_string())
    }
}

impl SpanContextInjector for StaticSpanContext {
    fn inject(&self) -> String {
        self.0.clone()
    }
}
