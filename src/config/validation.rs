//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, batch sizes > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{AppConfig, StoreBackend};

/// Upper bound for the synthetic submission delay.
pub const MAX_INJECTED_DELAY_MS: u64 = 60_000;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.path.trim().is_empty() {
        errors.push(ValidationError::new("store.path", "required for the sqlite backend"));
    }

    if config.observability.service_name.trim().is_empty() {
        errors.push(ValidationError::new("observability.service_name", "must not be empty"));
    }

    if config.tracing.max_queue_size == 0 {
        errors.push(ValidationError::new("tracing.max_queue_size", "must be greater than 0"));
    }
    if config.tracing.max_batch_size == 0 {
        errors.push(ValidationError::new("tracing.max_batch_size", "must be greater than 0"));
    } else if config.tracing.max_batch_size > config.tracing.max_queue_size {
        errors.push(ValidationError::new(
            "tracing.max_batch_size",
            "must not exceed tracing.max_queue_size",
        ));
    }
    if config.tracing.flush_interval_ms == 0 {
        errors.push(ValidationError::new("tracing.flush_interval_ms", "must be greater than 0"));
    }
    if let Some(endpoint) = &config.tracing.otlp_endpoint {
        if let Err(e) = Url::parse(endpoint) {
            errors.push(ValidationError::new(
                "tracing.otlp_endpoint",
                format!("'{}' is not a valid URL: {}", endpoint, e),
            ));
        }
    }

    if config.latency_injection.delay_ms > MAX_INJECTED_DELAY_MS {
        errors.push(ValidationError::new(
            "latency_injection.delay_ms",
            format!("must be at most {}", MAX_INJECTED_DELAY_MS),
        ));
    }
    if config.error_injection.timeout_delay_ms >= config.timeouts.request_secs.saturating_mul(1000) {
        errors.push(ValidationError::new(
            "error_injection.timeout_delay_ms",
            "must be shorter than timeouts.request_secs",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
