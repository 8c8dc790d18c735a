//! Request tracing on the OpenTelemetry SDK.
//!
//! # Responsibilities
//! - Create root and child spans for pipeline operations
//! - Attach attributes, state events and error status while a span is open
//! - Hand ended spans to the provider's batch processor
//!
//! # Design Decisions
//! - `SpanGuard` ends its span on drop, so early returns and `?` still end it
//! - Attributes are buffered on the guard and written once at end, so a key
//!   set twice is exported once with its last value
//! - The provider is owned by the `Tracer`, never installed globally

use opentelemetry::trace::{
    SpanContext, SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, Key, KeyValue, Value};
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider, SpanData};
use std::collections::BTreeMap;
use std::fmt;

/// Instrumentation scope reported on every span.
const SCOPE: &str = env!("CARGO_PKG_NAME");

/// Handle used to open spans. Cheap to clone.
#[derive(Clone)]
pub struct Tracer {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    enabled: bool,
}

impl Tracer {
    pub fn new(provider: SdkTracerProvider) -> Self {
        let tracer = provider.tracer(SCOPE);
        Self {
            provider,
            tracer,
            enabled: true,
        }
    }

    /// A tracer whose spans are never sampled or exported.
    pub fn disabled() -> Self {
        let provider = SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOff)
            .build();
        let tracer = provider.tracer(SCOPE);
        Self {
            provider,
            tracer,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Open a root span in a new trace.
    pub fn start_span(&self, name: &'static str) -> SpanGuard {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .start_with_context(&self.tracer, &Context::new());
        SpanGuard::new(self.tracer.clone(), Context::new().with_span(span))
    }

    /// Export every span ended so far. Failures are logged.
    pub async fn force_flush(&self) {
        let provider = self.provider.clone();
        match tokio::task::spawn_blocking(move || provider.force_flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Span flush failed"),
            Err(e) => tracing::warn!(error = %e, "Span flush task failed"),
        }
    }

    /// Flush and stop the batch processor. Spans ended afterwards are dropped.
    pub async fn shutdown(&self) {
        let provider = self.provider.clone();
        match tokio::task::spawn_blocking(move || provider.shutdown()).await {
            Ok(Ok(())) => tracing::debug!("Span export stopped"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Span export shutdown"),
            Err(e) => tracing::warn!(error = %e, "Span shutdown task failed"),
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// An open span. Ends when `end` is called or the guard is dropped.
pub struct SpanGuard {
    tracer: SdkTracer,
    cx: Context,
    attributes: BTreeMap<&'static str, Value>,
}

impl SpanGuard {
    fn new(tracer: SdkTracer, cx: Context) -> Self {
        Self {
            tracer,
            cx,
            attributes: BTreeMap::new(),
        }
    }

    pub fn span_context(&self) -> SpanContext {
        self.cx.span().span_context().clone()
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&mut self, key: &'static str, value: impl Into<Value>) {
        self.attributes.insert(key, value.into());
    }

    /// Record a point-in-time event on the span.
    pub fn add_event(&mut self, name: &'static str, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name, attributes);
    }

    /// Mark the span failed.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.cx.span().set_status(Status::error(message.into()));
    }

    /// Open a child span in this span's trace.
    pub fn child(&self, name: &'static str) -> SpanGuard {
        let span = self.tracer.start_with_context(name, &self.cx);
        SpanGuard::new(self.tracer.clone(), self.cx.with_span(span))
    }

    /// End the span now.
    pub fn end(self) {}
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let span = self.cx.span();
        if !self.attributes.is_empty() {
            let attributes = std::mem::take(&mut self.attributes)
                .into_iter()
                .map(|(key, value)| KeyValue::new(key, value))
                .collect::<Vec<_>>();
            span.set_attributes(attributes);
        }
        span.end();
    }
}

/// Last value recorded for `key` on an exported span.
pub fn span_attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    let key = Key::new(key.to_string());
    span.attributes
        .iter()
        .rev()
        .find(|kv| kv.key == key)
        .map(|kv| &kv.value)
}

pub fn is_root(span: &SpanData) -> bool {
    span.parent_span_id == opentelemetry::trace::SpanId::INVALID
}

pub fn is_error(span: &SpanData) -> bool {
    matches!(span.status, Status::Error { .. })
}
