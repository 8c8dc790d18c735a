//! Synthetic submission latency.
//!
//! A `LatencyInjection` strategy decides per submission whether to add an
//! artificial delay. `MemberLatencyRule` is the configuration-driven default
//! and can be swapped at runtime by the config watcher.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LatencyInjectionConfig;
use crate::models::PriorAuthRequest;

/// A delay to apply before processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedDelay {
    pub duration: Duration,
    pub reason: String,
}

pub trait LatencyInjection: Send + Sync {
    fn delay_for(&self, candidate: &PriorAuthRequest) -> Option<InjectedDelay>;
}

/// Never delays.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLatency;

impl LatencyInjection for NoLatency {
    fn delay_for(&self, _candidate: &PriorAuthRequest) -> Option<InjectedDelay> {
        None
    }
}

/// Delays submissions from the configured member ids.
pub struct MemberLatencyRule {
    config: ArcSwap<LatencyInjectionConfig>,
}

impl MemberLatencyRule {
    pub fn new(config: LatencyInjectionConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Replace the active rule. Submissions already delayed are unaffected.
    pub fn update(&self, config: LatencyInjectionConfig) {
        if **self.config.load() != config {
            tracing::info!(
                enabled = config.enabled,
                members = config.member_ids.len(),
                delay_ms = config.delay_ms,
                "Latency injection updated"
            );
            self.config.store(Arc::new(config));
        }
    }

    pub fn current(&self) -> Arc<LatencyInjectionConfig> {
        self.config.load_full()
    }
}

impl LatencyInjection for MemberLatencyRule {
    fn delay_for(&self, candidate: &PriorAuthRequest) -> Option<InjectedDelay> {
        let config = self.config.load();
        if !config.enabled || config.delay_ms == 0 {
            return None;
        }
        config
            .member_ids
            .iter()
            .any(|id| id == &candidate.member_id)
            .then(|| InjectedDelay {
                duration: Duration::from_millis(config.delay_ms),
                reason: config.reason.clone(),
            })
    }
}
