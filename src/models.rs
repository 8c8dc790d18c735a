//! Domain types shared by the pipeline, the store, and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Human-readable request identifier (`PA-00001`, `PA-00002`, ...).
///
/// Ordered by sequence number, so `PA-99999 < PA-100000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub const PREFIX: &'static str = "PA-";

    /// Build the identifier for the given 1-based sequence number.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{}{:05}", Self::PREFIX, sequence))
    }

    /// Accept a stored identifier: `PA-` followed by at least five digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix(Self::PREFIX)?;
        if digits.len() >= 5 && digits.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sequence number encoded in the identifier, if it is well formed.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }
}

impl Ord for RequestId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.sequence(), &self.0).cmp(&(other.sequence(), &other.0))
    }
}

impl PartialOrd for RequestId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Inbound prior-authorization submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorAuthRequest {
    pub member_id: String,
    pub provider_npi: String,
    pub diagnosis_code: String,
    pub requested_service: String,
}

/// A field that failed the structural length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub min: usize,
    pub max: usize,
    pub actual: usize,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} must be between {} and {} characters (got {})",
            self.field, self.min, self.max, self.actual
        )
    }
}

impl std::error::Error for FieldError {}

impl PriorAuthRequest {
    /// Schema-level length checks.
    ///
    /// `provider_npi` is left to the validation stage so that a malformed NPI
    /// goes through the audited rejection path.
    pub fn check_fields(&self) -> Result<(), FieldError> {
        let checks: [(&'static str, &str, usize, usize); 3] = [
            ("member_id", &self.member_id, 1, 50),
            ("diagnosis_code", &self.diagnosis_code, 1, 20),
            ("requested_service", &self.requested_service, 1, 100),
        ];

        for (field, value, min, max) in checks {
            let actual = value.chars().count();
            if actual < min || actual > max {
                return Err(FieldError { field, min, max, actual });
            }
        }
        Ok(())
    }
}

/// Lifecycle status of a stored request. Only `Pending` is produced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

/// Canonical stored request row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorAuthRecord {
    pub id: i64,
    pub request_id: RequestId,
    pub member_id: String,
    pub provider_npi: String,
    pub diagnosis_code: String,
    pub requested_service: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Kinds of audit events written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    RequestReceived,
    ValidationFailed,
    ValidationPassed,
    SavedToDatabase,
    StatusPending,
    ErrorTestStarted,
    DatabaseSlow,
    DatabaseTimeout,
    ValidationError,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 9] = [
        AuditEventType::RequestReceived,
        AuditEventType::ValidationFailed,
        AuditEventType::ValidationPassed,
        AuditEventType::SavedToDatabase,
        AuditEventType::StatusPending,
        AuditEventType::ErrorTestStarted,
        AuditEventType::DatabaseSlow,
        AuditEventType::DatabaseTimeout,
        AuditEventType::ValidationError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::RequestReceived => "REQUEST_RECEIVED",
            AuditEventType::ValidationFailed => "VALIDATION_FAILED",
            AuditEventType::ValidationPassed => "VALIDATION_PASSED",
            AuditEventType::SavedToDatabase => "SAVED_TO_DATABASE",
            AuditEventType::StatusPending => "STATUS_PENDING",
            AuditEventType::ErrorTestStarted => "ERROR_TEST_STARTED",
            AuditEventType::DatabaseSlow => "DATABASE_SLOW",
            AuditEventType::DatabaseTimeout => "DATABASE_TIMEOUT",
            AuditEventType::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown audit event type '{}'", s))
    }
}

/// A stored audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub request_id: String,
    pub event_type: AuditEventType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Audit trail for one request identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub request_id: String,
    pub events: Vec<AuditEvent>,
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub database: DatabaseStatus,
    pub timestamp: DateTime<Utc>,
}

/// Body of the test-error trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInjection {
    pub error_type: String,
}

/// Acknowledgment for error types that have no injected failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAck {
    pub error_triggered: String,
}
