//! SQLite-backed store.
//!
//! Each operation opens its own connection on a blocking thread, runs inside a
//! single transaction, and drops the connection. Dropping an uncommitted
//! `rusqlite::Transaction` rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, Row, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{AuditEvent, AuditEventType, PriorAuthRecord, RequestId, RequestStatus};
use crate::store::{NewAuditEvent, NewRequestRow, Store, StoreError};

const CREATE_REQUESTS: &str = r#"
CREATE TABLE IF NOT EXISTS prior_auth_requests (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id        TEXT NOT NULL UNIQUE,
    member_id         TEXT NOT NULL,
    provider_npi      TEXT NOT NULL,
    diagnosis_code    TEXT NOT NULL,
    requested_service TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending',
    created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

const CREATE_REQUEST_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS request_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id  TEXT NOT NULL,
    event_type  TEXT NOT NULL,
    message     TEXT NOT NULL,
    timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

const CREATE_REQUEST_LOGS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_request_logs_request_id ON request_logs (request_id, timestamp)";

const REQUEST_COLUMNS: &str =
    "id, request_id, member_id, provider_npi, diagnosis_code, requested_service, status, created_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(&format!(
            "{};\n{};\n{};",
            CREATE_REQUESTS, CREATE_REQUEST_LOGS, CREATE_REQUEST_LOGS_INDEX
        ))?;
        tracing::info!(path = %path.display(), "SQLite store ready");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside one transaction on a fresh connection.
    async fn transact<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let mut conn = Connection::open(&path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            let tx = conn.transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

fn parse_timestamp(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<PriorAuthRecord> {
    let status: String = row.get(6)?;
    Ok(PriorAuthRecord {
        id: row.get(0)?,
        request_id: {
            let raw: String = row.get(1)?;
            RequestId::parse(&raw)
                .ok_or_else(|| conversion_error(1, format!("malformed request id '{}'", raw)))?
        },
        member_id: row.get(2)?,
        provider_npi: row.get(3)?,
        diagnosis_code: row.get(4)?,
        requested_service: row.get(5)?,
        status: status.parse::<RequestStatus>().map_err(|e| conversion_error(6, e))?,
        created_at: parse_timestamp(7, row.get(7)?)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEvent> {
    let event_type: String = row.get(2)?;
    Ok(AuditEvent {
        id: row.get(0)?,
        request_id: row.get(1)?,
        event_type: event_type
            .parse::<AuditEventType>()
            .map_err(|e| conversion_error(2, e))?,
        message: row.get(3)?,
        timestamp: parse_timestamp(4, row.get(4)?)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.transact(|tx| {
            tx.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn count_requests(&self) -> Result<u64, StoreError> {
        self.transact(|tx| {
            let count: i64 =
                tx.query_row("SELECT COUNT(*) FROM prior_auth_requests", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn insert_request(&self, row: NewRequestRow) -> Result<PriorAuthRecord, StoreError> {
        self.transact(move |tx| {
            let sql = format!(
                "INSERT INTO prior_auth_requests \
                 (request_id, member_id, provider_npi, diagnosis_code, requested_service, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {}",
                REQUEST_COLUMNS
            );
            let result = tx.query_row(
                &sql,
                params![
                    row.request_id.as_str(),
                    row.member_id,
                    row.provider_npi,
                    row.diagnosis_code,
                    row.requested_service,
                    RequestStatus::Pending.as_str(),
                ],
                request_from_row,
            );
            match result {
                Ok(record) => Ok(record),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(StoreError::Duplicate(row.request_id.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn list_requests(&self, limit: usize) -> Result<Vec<PriorAuthRecord>, StoreError> {
        self.transact(move |tx| {
            let sql = format!(
                "SELECT {} FROM prior_auth_requests ORDER BY created_at DESC, id DESC LIMIT ?1",
                REQUEST_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit as i64], request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        self.transact(move |tx| {
            let stored = tx.query_row(
                "INSERT INTO request_logs (request_id, event_type, message) VALUES (?1, ?2, ?3) \
                 RETURNING id, request_id, event_type, message, timestamp",
                params![event.request_id, event.event_type.as_str(), event.message],
                audit_from_row,
            )?;
            Ok(stored)
        })
        .await
    }

    async fn audit_events(&self, request_id: &str) -> Result<Vec<AuditEvent>, StoreError> {
        let request_id = request_id.to_string();
        self.transact(move |tx| {
            let mut stmt = tx.prepare(
                "SELECT id, request_id, event_type, message, timestamp FROM request_logs \
                 WHERE request_id = ?1 ORDER BY timestamp ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![request_id], audit_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}
