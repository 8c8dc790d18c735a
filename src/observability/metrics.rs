//! Metrics collection and exposition.
//!
//! # Metrics
//! - `prior_auth_requests_total` (counter): requests by outcome `status` and `endpoint`
//! - `prior_auth_request_duration_seconds` (histogram): latency by `endpoint`
//! - `prior_auth_validation_failures_total` (counter): by `failure_type`
//! - `prior_auth_database_operations_total` (counter): by `operation_type`
//!
//! # Design Decisions
//! - One registry per `Observability` context instead of a process-global recorder
//! - Label values come from closed enums, so every series is predeclared
//! - Updates are atomic handle operations and cannot fail the caller

use metrics::{Key, KeyName, Label, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Instant;

use crate::error::ValidationReason;

pub const REQUESTS_TOTAL: &str = "prior_auth_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "prior_auth_request_duration_seconds";
pub const VALIDATION_FAILURES_TOTAL: &str = "prior_auth_validation_failures_total";
pub const DATABASE_OPERATIONS_TOTAL: &str = "prior_auth_database_operations_total";

/// Histogram buckets tuned for API latencies, including the multi-second
/// injected delays.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Endpoint label values.
pub mod endpoints {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const SUBMIT: &str = "/prior-auth/submit";
    pub const LIST: &str = "/prior-auth/requests";
    pub const LOGS: &str = "/prior-auth/requests/{request_id}/logs";
    pub const TEST_ERRORS: &str = "/prior-auth/test/errors";
}

/// Outcome label for `prior_auth_requests_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Error,
    ValidationError,
    TimeoutError,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Error => "error",
            RequestOutcome::ValidationError => "validation_error",
            RequestOutcome::TimeoutError => "timeout_error",
        }
    }
}

/// Operation label for `prior_auth_database_operations_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOperation {
    InsertRequest,
    InsertLog,
    SelectRequests,
    SelectLogs,
}

impl DatabaseOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseOperation::InsertRequest => "insert_request",
            DatabaseOperation::InsertLog => "insert_log",
            DatabaseOperation::SelectRequests => "select_requests",
            DatabaseOperation::SelectLogs => "select_logs",
        }
    }
}

/// Prometheus-backed registry owned by one service instance.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let builder = match PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION_SECONDS.to_string()), LATENCY_BUCKETS)
        {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid latency buckets, falling back to summaries");
                PrometheusBuilder::new()
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        let registry = Self { recorder, handle };
        registry.describe();
        registry
    }

    fn describe(&self) {
        let counters = [
            (REQUESTS_TOTAL, "Total number of prior auth requests"),
            (VALIDATION_FAILURES_TOTAL, "Total validation failures"),
            (DATABASE_OPERATIONS_TOTAL, "Total database operations"),
        ];
        for (name, help) in counters {
            self.recorder
                .describe_counter(KeyName::from(name), None, SharedString::from(help));
        }
        self.recorder.describe_histogram(
            KeyName::from(REQUEST_DURATION_SECONDS),
            Some(metrics::Unit::Seconds),
            SharedString::from("Request duration in seconds"),
        );
    }

    fn key(name: &'static str, labels: &[(&'static str, &str)]) -> Key {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(k, v)| Label::new(*k, v.to_string()))
            .collect();
        Key::from_parts(name, labels)
    }

    fn metadata() -> Metadata<'static> {
        Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
    }

    /// Add one to the counter identified by `name` and `labels`.
    pub fn increment_counter(&self, name: &'static str, labels: &[(&'static str, &str)]) {
        let key = Self::key(name, labels);
        self.recorder.register_counter(&key, &Self::metadata()).increment(1);
    }

    /// Record one histogram observation.
    pub fn observe_histogram(&self, name: &'static str, labels: &[(&'static str, &str)], value: f64) {
        let key = Self::key(name, labels);
        self.recorder.register_histogram(&key, &Self::metadata()).record(value);
    }

    /// Render every series in Prometheus text exposition format.
    pub fn snapshot(&self) -> String {
        self.handle.render()
    }

    pub fn record_request(&self, outcome: RequestOutcome, endpoint: &'static str) {
        self.increment_counter(
            REQUESTS_TOTAL,
            &[("status", outcome.as_str()), ("endpoint", endpoint)],
        );
    }

    pub fn record_validation_failure(&self, reason: ValidationReason) {
        self.increment_counter(VALIDATION_FAILURES_TOTAL, &[("failure_type", reason.as_str())]);
    }

    pub fn record_database_operation(&self, operation: DatabaseOperation) {
        self.increment_counter(DATABASE_OPERATIONS_TOTAL, &[("operation_type", operation.as_str())]);
    }

    /// Start a latency timer; the observation is recorded when it drops.
    pub fn start_timer(&self, endpoint: &'static str) -> RequestTimer<'_> {
        RequestTimer {
            registry: self,
            endpoint,
            started: Instant::now(),
        }
    }
}

/// Scoped latency measurement for one endpoint invocation.
pub struct RequestTimer<'a> {
    registry: &'a MetricsRegistry,
    endpoint: &'static str,
    started: Instant,
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.registry
            .observe_histogram(REQUEST_DURATION_SECONDS, &[("endpoint", self.endpoint)], elapsed);
    }
}

/// Value of the first sample line of `name` whose labels include every
/// `key="value"` pair in `labels`. Meant for reading snapshots in tests and
/// tooling.
pub fn sample_value(snapshot: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    snapshot
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(name)
                .map(|rest| rest.starts_with('{') || rest.starts_with(' '))
                .unwrap_or(false)
        })
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
