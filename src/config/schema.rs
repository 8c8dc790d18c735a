//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the prior authorization service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Persistent store selection.
    pub store: StoreConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Span export settings.
    pub tracing: TracingConfig,

    /// Synthetic per-member latency hook.
    pub latency_injection: LatencyInjectionConfig,

    /// Error-injection endpoint settings.
    pub error_injection: ErrorInjectionConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Which store implementation backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file for the sqlite backend.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: "prior_auth.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name reported on exported spans.
    pub service_name: String,

    /// Deployment environment reported on exported spans.
    pub environment: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "prior-auth-api".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Span export configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Record and export spans.
    pub enabled: bool,

    /// OTLP/HTTP base endpoint; spans are posted to `<endpoint>/v1/traces`.
    /// When unset, spans are recorded but not exported.
    pub otlp_endpoint: Option<String>,

    /// Extra export headers as `key=value` pairs separated by commas.
    pub otlp_headers: String,

    /// Spans buffered ahead of the exporter. Spans closed while the queue is
    /// full are dropped.
    pub max_queue_size: usize,

    /// Spans sent per export call.
    pub max_batch_size: usize,

    /// Flush at least this often, in milliseconds.
    pub flush_interval_ms: u64,

    /// Per-export HTTP timeout in seconds.
    pub export_timeout_secs: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: None,
            otlp_headers: String::new(),
            max_queue_size: 2048,
            max_batch_size: 512,
            flush_interval_ms: 5000,
            export_timeout_secs: 10,
        }
    }
}

/// Synthetic latency applied to submissions from selected members.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LatencyInjectionConfig {
    pub enabled: bool,

    /// Member ids that receive the delay.
    pub member_ids: Vec<String>,

    /// Delay in milliseconds.
    pub delay_ms: u64,

    /// Reason recorded on the delay span.
    pub reason: String,
}

impl Default for LatencyInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            member_ids: vec!["M99999".to_string()],
            delay_ms: 2000,
            reason: "Simulating database contention".to_string(),
        }
    }
}

/// Error-injection endpoint configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorInjectionConfig {
    /// Delay before the synthetic database timeout is raised, in milliseconds.
    pub timeout_delay_ms: u64,
}

impl Default for ErrorInjectionConfig {
    fn default() -> Self {
        Self {
            timeout_delay_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, "prior_auth.db");
        assert_eq!(config.latency_injection.member_ids, vec!["M99999"]);
        assert_eq!(config.error_injection.timeout_delay_ms, 5000);
        assert!(config.tracing.otlp_endpoint.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [store]
            backend = "sqlite"
            path = "/tmp/pa.db"

            [observability]
            log_format = "json"

            [latency_injection]
            member_ids = ["M1", "M2"]
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, "/tmp/pa.db");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.latency_injection.member_ids, vec!["M1", "M2"]);
        assert_eq!(config.latency_injection.delay_ms, 2000);
    }
}
