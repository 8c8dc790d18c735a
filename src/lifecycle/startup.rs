//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the store selected by configuration
//! - Build the observability context and the export task
//! - Assemble the request pipeline with its injection hooks
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::ObservabilityWriteError;
use crate::observability::Observability;
use crate::pipeline::latency::MemberLatencyRule;
use crate::pipeline::RequestPipeline;
use crate::store::{self, Store, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to initialize span export: {0}")]
    Observability(#[from] ObservabilityWriteError),
}

/// Everything the HTTP layer needs to serve requests.
#[derive(Clone)]
pub struct Services {
    pub pipeline: RequestPipeline,
    /// Kept so configuration reloads can retune the delay.
    pub latency_rule: Arc<MemberLatencyRule>,
}

/// Build services from configuration. Must run inside a Tokio runtime.
pub fn build_services(config: &AppConfig) -> Result<Services, StartupError> {
    let store = store::from_config(&config.store)?;
    tracing::info!(backend = ?config.store.backend, "Store opened");

    let observability = Observability::from_config(config)?;
    Ok(build_services_with(config, store, observability))
}

/// Build services around an existing store and observability context.
pub fn build_services_with(
    config: &AppConfig,
    store: Arc<dyn Store>,
    observability: Observability,
) -> Services {
    let latency_rule = Arc::new(MemberLatencyRule::new(config.latency_injection.clone()));
    let pipeline = RequestPipeline::new(store, observability)
        .with_latency_injection(latency_rule.clone())
        .with_error_injection(Duration::from_millis(config.error_injection.timeout_delay_ms));

    Services {
        pipeline,
        latency_rule,
    }
}
