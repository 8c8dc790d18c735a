//! Request-processing pipeline.
//!
//! # Submission flow
//! ```text
//! RECEIVED ──next_id──▶ ID_ASSIGNED ──▶ VALIDATING ──┬──▶ VALIDATION_FAILED
//!     │                                              └──▶ VALIDATION_PASSED
//!     └──▶ ID_FAILED                                         │
//!                                                            ▼
//!                                      PERSISTED ◀──┬── PERSISTING
//!                                  PERSIST_FAILED ◀─┘
//! ```
//!
//! Every transition is recorded on the root span as `pipeline.state`. Audit
//! rows, metrics and spans are emitted on every exit path before the error is
//! returned to the caller.

pub mod error_injection;
pub mod ids;
pub mod latency;
pub mod persistence;
pub mod validation;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PipelineError, ValidationReason};
use crate::models::{
    AuditEventType, AuditTrail, DatabaseStatus, ErrorAck, HealthReport, HealthStatus,
    PriorAuthRecord, PriorAuthRequest, RequestId, ServiceInfo,
};
use crate::observability::metrics::{endpoints, DatabaseOperation, RequestOutcome};
use crate::observability::{AuditRecorder, Observability, SpanGuard};
use crate::store::Store;

use self::error_injection::{describe_delay, error_test_id, InjectedError};
use self::latency::{LatencyInjection, NoLatency};

/// Rows returned by `list_requests`.
pub const LIST_LIMIT: usize = 100;

pub mod spans {
    pub const SUBMIT: &str = "submit_prior_auth";
    pub const VALIDATE_NPI: &str = "validate_npi";
    pub const DATABASE_INSERT: &str = "database_insert";
    pub const SYNTHETIC_DELAY: &str = "synthetic_delay";
    pub const TRIGGER_TEST_ERROR: &str = "trigger_test_error";

    pub const STATE_ATTRIBUTE: &str = "pipeline.state";
}

/// Submission states recorded on the root span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    IdAssigned,
    IdFailed,
    Validating,
    ValidationFailed,
    ValidationPassed,
    Persisting,
    Persisted,
    PersistFailed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::IdAssigned => "ID_ASSIGNED",
            PipelineState::IdFailed => "ID_FAILED",
            PipelineState::Validating => "VALIDATING",
            PipelineState::ValidationFailed => "VALIDATION_FAILED",
            PipelineState::ValidationPassed => "VALIDATION_PASSED",
            PipelineState::Persisting => "PERSISTING",
            PipelineState::Persisted => "PERSISTED",
            PipelineState::PersistFailed => "PERSIST_FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::IdFailed
                | PipelineState::ValidationFailed
                | PipelineState::Persisted
                | PipelineState::PersistFailed
        )
    }
}

fn enter(root: &mut SpanGuard, state: PipelineState) {
    root.add_event(state.as_str(), Vec::new());
    root.set_attribute(spans::STATE_ATTRIBUTE, state.as_str());
}

/// Orchestrates identifier assignment, validation, persistence and the
/// audit/metric/trace side channels.
#[derive(Clone)]
pub struct RequestPipeline {
    store: Arc<dyn Store>,
    audit: AuditRecorder,
    observability: Observability,
    latency: Arc<dyn LatencyInjection>,
    timeout_delay: Duration,
}

impl RequestPipeline {
    pub fn new(store: Arc<dyn Store>, observability: Observability) -> Self {
        let audit = AuditRecorder::new(store.clone(), observability.metrics.clone());
        Self {
            store,
            audit,
            observability,
            latency: Arc::new(NoLatency),
            timeout_delay: Duration::from_millis(5000),
        }
    }

    pub fn with_latency_injection(mut self, latency: Arc<dyn LatencyInjection>) -> Self {
        self.latency = latency;
        self
    }

    /// Delay before the synthetic database timeout fires.
    pub fn with_error_injection(mut self, timeout_delay: Duration) -> Self {
        self.timeout_delay = timeout_delay;
        self
    }

    pub fn observability(&self) -> &Observability {
        &self.observability
    }

    pub fn service_info(&self) -> ServiceInfo {
        self.observability
            .metrics
            .record_request(RequestOutcome::Success, endpoints::ROOT);
        ServiceInfo {
            message: "Prior Authorization API".to_string(),
            status: "running".to_string(),
        }
    }

    /// Probe the store. Failure is reported in the body, never raised.
    pub async fn health(&self) -> HealthReport {
        let metrics = &self.observability.metrics;
        let _timer = metrics.start_timer(endpoints::HEALTH);

        match self.store.ping().await {
            Ok(()) => {
                metrics.record_request(RequestOutcome::Success, endpoints::HEALTH);
                HealthReport {
                    status: HealthStatus::Healthy,
                    database: DatabaseStatus::Connected,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                metrics.record_request(RequestOutcome::Error, endpoints::HEALTH);
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    database: DatabaseStatus::Disconnected,
                    timestamp: Utc::now(),
                }
            }
        }
    }

    /// Validate and persist one submission.
    pub async fn submit(&self, candidate: PriorAuthRequest) -> Result<PriorAuthRecord, PipelineError> {
        let metrics = &self.observability.metrics;
        let _timer = metrics.start_timer(endpoints::SUBMIT);
        let mut root = self.observability.tracer.start_span(spans::SUBMIT);
        enter(&mut root, PipelineState::Received);

        let request_id = match ids::next_id(self.store.as_ref()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "Request id assignment failed");
                enter(&mut root, PipelineState::IdFailed);
                root.set_error(e.to_string());
                return Err(e.into());
            }
        };
        enter(&mut root, PipelineState::IdAssigned);
        root.set_attribute("request.id", request_id.to_string());
        root.set_attribute("request.member_id", candidate.member_id.clone());
        root.set_attribute("request.provider_npi", candidate.provider_npi.clone());

        self.apply_latency(&root, &candidate, &request_id).await;

        tracing::info!(
            request_id = %request_id,
            provider_npi = %candidate.provider_npi,
            "Received prior auth request"
        );
        self.audit
            .record(
                request_id.as_str(),
                AuditEventType::RequestReceived,
                format!("Submitted by provider NPI {}", candidate.provider_npi),
            )
            .await;

        enter(&mut root, PipelineState::Validating);
        let mut validate_span = root.child(spans::VALIDATE_NPI);
        if let Err(reason) = validation::validate(&candidate) {
            let message = validation::failure_message(reason);
            tracing::warn!(
                request_id = %request_id,
                provider_npi = %candidate.provider_npi,
                reason = %reason,
                "Validation failed"
            );
            self.audit
                .record(
                    request_id.as_str(),
                    AuditEventType::ValidationFailed,
                    format!("Invalid NPI format: {}", candidate.provider_npi),
                )
                .await;
            metrics.record_validation_failure(reason);
            metrics.record_request(RequestOutcome::ValidationError, endpoints::SUBMIT);

            validate_span.set_error(message);
            validate_span.end();
            enter(&mut root, PipelineState::ValidationFailed);
            root.set_error(message);
            return Err(PipelineError::validation(reason, message));
        }
        validate_span.end();

        enter(&mut root, PipelineState::ValidationPassed);
        self.audit
            .record(
                request_id.as_str(),
                AuditEventType::ValidationPassed,
                "All required fields validated",
            )
            .await;

        enter(&mut root, PipelineState::Persisting);
        let mut insert_span = root.child(spans::DATABASE_INSERT);
        insert_span.set_attribute("db.operation", DatabaseOperation::InsertRequest.as_str());
        let record = match persistence::insert(self.store.as_ref(), &candidate, &request_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Persisting request failed");
                insert_span.set_error(e.to_string());
                insert_span.end();
                enter(&mut root, PipelineState::PersistFailed);
                root.set_error(e.to_string());
                return Err(e.into());
            }
        };
        insert_span.end();
        metrics.record_database_operation(DatabaseOperation::InsertRequest);

        self.audit
            .record(
                request_id.as_str(),
                AuditEventType::SavedToDatabase,
                format!("Request saved for member {}", candidate.member_id),
            )
            .await;
        self.audit
            .record(request_id.as_str(), AuditEventType::StatusPending, "Awaiting review")
            .await;

        metrics.record_request(RequestOutcome::Success, endpoints::SUBMIT);
        enter(&mut root, PipelineState::Persisted);
        tracing::info!(request_id = %request_id, "Created prior auth request");
        Ok(record)
    }

    async fn apply_latency(&self, root: &SpanGuard, candidate: &PriorAuthRequest, request_id: &RequestId) {
        let Some(delay) = self.latency.delay_for(candidate) else {
            return;
        };

        let delay_ms = i64::try_from(delay.duration.as_millis()).unwrap_or(i64::MAX);
        let mut span = root.child(spans::SYNTHETIC_DELAY);
        span.set_attribute("delay_ms", delay_ms);
        span.set_attribute("reason", delay.reason.clone());

        tracing::warn!(
            request_id = %request_id,
            member_id = %candidate.member_id,
            delay_ms,
            "Applying synthetic delay"
        );
        tokio::time::sleep(delay.duration).await;
        span.end();
    }

    /// Newest requests first, at most `LIST_LIMIT`.
    pub async fn list_requests(&self) -> Result<Vec<PriorAuthRecord>, PipelineError> {
        let metrics = &self.observability.metrics;
        let _timer = metrics.start_timer(endpoints::LIST);

        match self.store.list_requests(LIST_LIMIT).await {
            Ok(records) => {
                metrics.record_database_operation(DatabaseOperation::SelectRequests);
                metrics.record_request(RequestOutcome::Success, endpoints::LIST);
                Ok(records)
            }
            Err(e) => {
                tracing::error!(error = %e, "Listing requests failed");
                metrics.record_request(RequestOutcome::Error, endpoints::LIST);
                Err(e.into())
            }
        }
    }

    /// Audit events for any identifier, including synthetic `ERROR-*` ids.
    pub async fn audit_trail(&self, request_id: &str) -> Result<AuditTrail, PipelineError> {
        let events = self.audit.history(request_id).await?;
        Ok(AuditTrail {
            request_id: request_id.to_string(),
            events,
        })
    }

    /// Produce a synthetic failure so it shows up in every channel.
    pub async fn trigger_test_error(&self, error_type: &str) -> Result<ErrorAck, PipelineError> {
        let metrics = &self.observability.metrics;
        let mut root = self
            .observability
            .tracer
            .start_span(spans::TRIGGER_TEST_ERROR);
        root.set_attribute("error.type", error_type.to_string());

        let error_id = error_test_id(Utc::now());
        root.set_attribute("error.id", error_id.clone());
        tracing::warn!(error_id = %error_id, error_type, "Triggering test error");
        self.audit
            .record(
                &error_id,
                AuditEventType::ErrorTestStarted,
                format!("Testing {}", error_type),
            )
            .await;

        match InjectedError::parse(error_type) {
            InjectedError::DatabaseTimeout => {
                self.audit
                    .record(
                        &error_id,
                        AuditEventType::DatabaseSlow,
                        format!("Simulating {} timeout", describe_delay(self.timeout_delay)),
                    )
                    .await;
                tokio::time::sleep(self.timeout_delay).await;
                self.audit
                    .record(
                        &error_id,
                        AuditEventType::DatabaseTimeout,
                        "Query exceeded timeout threshold",
                    )
                    .await;

                metrics.record_request(RequestOutcome::TimeoutError, endpoints::TEST_ERRORS);
                root.set_error("Database timeout");
                Err(PipelineError::timeout("Database timeout"))
            }
            InjectedError::ValidationError => {
                self.audit
                    .record(&error_id, AuditEventType::ValidationError, "Missing required field")
                    .await;

                metrics.record_request(RequestOutcome::ValidationError, endpoints::TEST_ERRORS);
                let reason = ValidationReason::MissingRequiredField;
                let message = validation::failure_message(reason);
                root.set_error(message);
                Err(PipelineError::validation(reason, message))
            }
            InjectedError::Unknown(error_triggered) => Ok(ErrorAck { error_triggered }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<&str> = [
            PipelineState::Received,
            PipelineState::IdAssigned,
            PipelineState::IdFailed,
            PipelineState::Validating,
            PipelineState::ValidationFailed,
            PipelineState::ValidationPassed,
            PipelineState::Persisting,
            PipelineState::Persisted,
            PipelineState::PersistFailed,
        ]
        .iter()
        .filter(|s| s.is_terminal())
        .map(|s| s.as_str())
        .collect();
        assert_eq!(
            terminal,
            vec!["ID_FAILED", "VALIDATION_FAILED", "PERSISTED", "PERSIST_FAILED"]
        );
    }

    #[tokio::test]
    async fn test_service_info_counts_success() {
        let (observability, _spans) = Observability::in_memory();
        let pipeline = RequestPipeline::new(
            Arc::new(crate::store::MemoryStore::new()),
            observability.clone(),
        );
        let info = pipeline.service_info();
        assert_eq!(info.status, "running");
        assert_eq!(
            crate::observability::metrics::sample_value(
                &observability.metrics.snapshot(),
                crate::observability::metrics::REQUESTS_TOTAL,
                &[("status", "success"), ("endpoint", "/")]
            ),
            Some(1.0)
        );
    }
}
