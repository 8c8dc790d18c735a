//! Audit trail recording.
//!
//! Writes are best-effort: a failed append is logged and dropped so the
//! request that produced it carries on.

use std::sync::Arc;

use crate::error::ObservabilityWriteError;
use crate::models::{AuditEvent, AuditEventType};
use crate::observability::metrics::{DatabaseOperation, MetricsRegistry};
use crate::store::{NewAuditEvent, Store, StoreError};

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsRegistry>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn Store>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { store, metrics }
    }

    /// Append one event, swallowing failures.
    pub async fn record(&self, request_id: &str, event_type: AuditEventType, message: impl Into<String>) {
        if let Err(e) = self.try_record(request_id, event_type, message.into()).await {
            tracing::error!(
                request_id,
                event_type = %event_type,
                error = %e,
                "Audit write failed"
            );
        }
    }

    async fn try_record(
        &self,
        request_id: &str,
        event_type: AuditEventType,
        message: String,
    ) -> Result<AuditEvent, ObservabilityWriteError> {
        let event = self
            .store
            .append_audit(NewAuditEvent {
                request_id: request_id.to_string(),
                event_type,
                message,
            })
            .await
            .map_err(ObservabilityWriteError::Audit)?;

        self.metrics.record_database_operation(DatabaseOperation::InsertLog);
        tracing::debug!(request_id, event_type = %event_type, "Audit event recorded");
        Ok(event)
    }

    /// Events for `request_id`, oldest first.
    pub async fn history(&self, request_id: &str) -> Result<Vec<AuditEvent>, StoreError> {
        let events = self.store.audit_events(request_id).await?;
        self.metrics.record_database_operation(DatabaseOperation::SelectLogs);
        Ok(events)
    }
}
