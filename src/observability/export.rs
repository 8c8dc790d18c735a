//! Span export pipeline.
//!
//! # Data Flow
//! ```text
//! SpanGuard drop → BatchSpanProcessor queue (bounded, drops when full)
//!                      │ background worker
//!                      ├─ export when max_batch_size spans are queued
//!                      ├─ export every flush_interval
//!                      └─ export on force_flush / shutdown
//!                      ▼
//!                  OTLP/HTTP exporter  or  in-memory exporter (tests)
//! ```
//!
//! Export is fire-and-forget. A failed batch is dropped by the processor.

use opentelemetry::KeyValue;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, InMemorySpanExporter, Sampler,
    SdkTracerProvider,
};
use opentelemetry_sdk::Resource;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{AppConfig, ObservabilityConfig, TracingConfig};
use crate::error::ObservabilityWriteError;

/// Resource attributes stamped on every exported span.
pub fn resource(config: &ObservabilityConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build()
}

/// Queue and batch limits for the span processor.
pub fn batch_config(config: &TracingConfig) -> BatchConfig {
    BatchConfigBuilder::default()
        .with_max_queue_size(config.max_queue_size.max(1))
        .with_max_export_batch_size(config.max_batch_size.clamp(1, config.max_queue_size.max(1)))
        .with_scheduled_delay(Duration::from_millis(config.flush_interval_ms.max(1)))
        .build()
}

/// Parse `key=value` pairs separated by commas.
///
/// Quotes around the whole string are stripped, blank pairs and pairs
/// without `=` are skipped.
pub fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Full trace ingest URL for an OTLP/HTTP base endpoint.
pub fn traces_url(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with("/v1/traces") {
        base.to_string()
    } else {
        format!("{}/v1/traces", base)
    }
}

/// OTLP/HTTP protobuf exporter for `endpoint`.
///
/// The exporter wraps a blocking HTTP client, which cannot be created on a
/// Tokio worker; callers inside a runtime go through [`provider`].
pub fn otlp_exporter(
    endpoint: &str,
    config: &TracingConfig,
) -> Result<opentelemetry_otlp::SpanExporter, ObservabilityWriteError> {
    let headers: HashMap<String, String> = parse_headers(&config.otlp_headers).into_iter().collect();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(traces_url(endpoint))
        .with_timeout(Duration::from_secs(config.export_timeout_secs))
        .with_headers(headers)
        .build()?;
    Ok(exporter)
}

/// Tracer provider for the configured destination.
///
/// `None` when tracing is disabled. With no OTLP endpoint, spans are
/// recorded but have nowhere to go.
pub fn provider(config: &AppConfig) -> Result<Option<SdkTracerProvider>, ObservabilityWriteError> {
    if !config.tracing.enabled {
        return Ok(None);
    }

    let builder = SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource(&config.observability));

    let provider = match &config.tracing.otlp_endpoint {
        Some(endpoint) => {
            let exporter = std::thread::scope(|scope| {
                scope
                    .spawn(|| otlp_exporter(endpoint, &config.tracing))
                    .join()
            })
            .map_err(|_| ObservabilityWriteError::ExporterSetup)??;
            let processor = BatchSpanProcessor::builder(exporter)
                .with_batch_config(batch_config(&config.tracing))
                .build();
            tracing::info!(
                url = %traces_url(endpoint),
                max_queue_size = config.tracing.max_queue_size,
                "Exporting spans over OTLP/HTTP"
            );
            builder.with_span_processor(processor).build()
        }
        None => {
            tracing::info!("No OTLP endpoint configured, spans are not exported");
            builder.build()
        }
    };
    Ok(Some(provider))
}

/// Provider batching into an in-memory exporter, for tests and demos.
pub fn in_memory_provider(
    config: &ObservabilityConfig,
    limits: &TracingConfig,
) -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let processor = BatchSpanProcessor::builder(exporter.clone())
        .with_batch_config(batch_config(limits))
        .build();
    let provider = SdkTracerProvider::builder()
        .with_resource(resource(config))
        .with_span_processor(processor)
        .build();
    (provider, exporter)
}
