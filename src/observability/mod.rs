//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline produces:
//!     → audit.rs   (append-only audit rows in the store)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (spans) → export.rs (OTel batch processor → OTLP / memory)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → GET /prior-auth/requests/{id}/logs (audit trail)
//!     → GET /metrics (Prometheus scrape)
//!     → OTLP collector
//! ```
//!
//! # Design Decisions
//! - No process-global registries; one `Observability` value is built at
//!   startup and injected
//! - Metrics are cheap (atomic increments)
//! - Span export never blocks or fails a request

pub mod audit;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod tracing;

use opentelemetry_sdk::trace::InMemorySpanExporter;
use std::sync::Arc;

use crate::config::{AppConfig, ObservabilityConfig, TracingConfig};
use crate::error::ObservabilityWriteError;

pub use self::audit::AuditRecorder;
pub use self::metrics::MetricsRegistry;
pub use self::tracing::{SpanGuard, Tracer};

/// Metrics and tracing handles shared by every request.
#[derive(Clone)]
pub struct Observability {
    pub metrics: Arc<MetricsRegistry>,
    pub tracer: Tracer,
}

impl Observability {
    pub fn new(metrics: Arc<MetricsRegistry>, tracer: Tracer) -> Self {
        Self { metrics, tracer }
    }

    /// Fresh metrics and a tracer batching into the returned in-memory
    /// exporter. Call `tracer.force_flush()` before reading it.
    pub fn in_memory() -> (Self, InMemorySpanExporter) {
        let limits = TracingConfig {
            flush_interval_ms: 100,
            ..TracingConfig::default()
        };
        let (provider, exporter) =
            export::in_memory_provider(&ObservabilityConfig::default(), &limits);
        let observability = Self::new(Arc::new(MetricsRegistry::new()), Tracer::new(provider));
        (observability, exporter)
    }

    /// Build from configuration. Spans go to OTLP when an endpoint is set and
    /// are not sampled when tracing is disabled.
    pub fn from_config(config: &AppConfig) -> Result<Self, ObservabilityWriteError> {
        let metrics = Arc::new(MetricsRegistry::new());

        let tracer = match export::provider(config)? {
            Some(provider) => Tracer::new(provider),
            None => {
                ::tracing::info!("Span export disabled");
                Tracer::disabled()
            }
        };
        Ok(Self::new(metrics, tracer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_disabled_tracing() {
        let mut config = AppConfig::default();
        config.tracing.enabled = false;
        let obs = Observability::from_config(&config).unwrap();
        assert!(!obs.tracer.is_enabled());
    }

    #[tokio::test]
    async fn test_from_config_otlp() {
        let mut config = AppConfig::default();
        config.tracing.otlp_endpoint = Some("http://127.0.0.1:4318".into());
        let obs = Observability::from_config(&config).unwrap();
        assert!(obs.tracer.is_enabled());
        obs.tracer.shutdown().await;
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let (obs, exporter) = Observability::in_memory();
        obs.tracer.start_span("submit_prior_auth").end();
        obs.tracer.force_flush().await;
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }
}
