//! Process-local store.
//!
//! Request rows live behind a `RwLock`; audit rows are sharded per request id
//! in a `DashMap`. Fault switches let tests drive every failure path of the
//! pipeline.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::RwLock;

use crate::models::{AuditEvent, PriorAuthRecord, RequestStatus};
use crate::store::{NewAuditEvent, NewRequestRow, Store, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    requests: RwLock<Vec<PriorAuthRecord>>,
    audit: DashMap<String, Vec<AuditEvent>>,
    next_audit_id: AtomicI64,
    unavailable: AtomicBool,
    fail_inserts: AtomicBool,
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Only request inserts fail; counts and reads still succeed.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Only audit appends fail.
    pub fn set_fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Total audit rows across all request ids.
    pub fn audit_len(&self) -> usize {
        self.audit.iter().map(|entry| entry.value().len()).sum()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".into())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn count_requests(&self) -> Result<u64, StoreError> {
        self.check_available()?;
        let requests = self.requests.read().map_err(|_| Self::poisoned())?;
        Ok(requests.len() as u64)
    }

    async fn insert_request(&self, row: NewRequestRow) -> Result<PriorAuthRecord, StoreError> {
        self.check_available()?;
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".into()));
        }

        let mut requests = self.requests.write().map_err(|_| Self::poisoned())?;
        if requests.iter().any(|r| r.request_id == row.request_id) {
            return Err(StoreError::Duplicate(row.request_id.to_string()));
        }

        let record = PriorAuthRecord {
            id: requests.len() as i64 + 1,
            request_id: row.request_id,
            member_id: row.member_id,
            provider_npi: row.provider_npi,
            diagnosis_code: row.diagnosis_code,
            requested_service: row.requested_service,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        requests.push(record.clone());
        Ok(record)
    }

    async fn list_requests(&self, limit: usize) -> Result<Vec<PriorAuthRecord>, StoreError> {
        self.check_available()?;
        let requests = self.requests.read().map_err(|_| Self::poisoned())?;
        let mut rows: Vec<PriorAuthRecord> = requests.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        self.check_available()?;
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit table unavailable".into()));
        }

        let stored = AuditEvent {
            id: self.next_audit_id.fetch_add(1, Ordering::SeqCst) + 1,
            request_id: event.request_id,
            event_type: event.event_type,
            message: event.message,
            timestamp: Utc::now(),
        };
        self.audit
            .entry(stored.request_id.clone())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn audit_events(&self, request_id: &str) -> Result<Vec<AuditEvent>, StoreError> {
        self.check_available()?;
        let mut events = self
            .audit
            .get(request_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(events)
    }
}
