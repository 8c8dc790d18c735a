//! Persistent store subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline / audit recorder
//!     → Store trait (one call = one transaction)
//!     → memory.rs (process-local, fault injectable)
//!     → sqlite.rs (rusqlite, connection per call, spawn_blocking)
//! ```
//!
//! # Design Decisions
//! - Typed operations instead of raw SQL at the call sites
//! - Commit on success, rollback on any error
//! - No pooling: a connection is opened, used once, and released
//! - `request_id` is UNIQUE; duplicate assignment surfaces as `StoreError::Duplicate`

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{AuditEvent, AuditEventType, PriorAuthRecord, RequestId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("request id {0} already exists")]
    Duplicate(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Values for a new request row. Surrogate id, status and timestamp are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRequestRow {
    pub request_id: RequestId,
    pub member_id: String,
    pub provider_npi: String,
    pub diagnosis_code: String,
    pub requested_service: String,
}

/// Values for a new audit row. Surrogate id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub request_id: String,
    pub event_type: AuditEventType,
    pub message: String,
}

/// Transactional key-row store consumed by the pipeline.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Number of persisted request rows.
    async fn count_requests(&self) -> Result<u64, StoreError>;

    /// Insert a request with status `pending` and return the stored row.
    async fn insert_request(&self, row: NewRequestRow) -> Result<PriorAuthRecord, StoreError>;

    /// Requests ordered newest first, at most `limit` rows.
    async fn list_requests(&self, limit: usize) -> Result<Vec<PriorAuthRecord>, StoreError>;

    /// Append one audit row.
    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError>;

    /// Audit rows for `request_id`, oldest first.
    async fn audit_events(&self, request_id: &str) -> Result<Vec<AuditEvent>, StoreError>;
}

/// Build the store selected by configuration.
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.path)?)),
    }
}
