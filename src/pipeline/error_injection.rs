//! Synthetic failures for exercising the observability channels.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Error kinds understood by the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedError {
    DatabaseTimeout,
    ValidationError,
    /// Anything else is acknowledged and echoed back.
    Unknown(String),
}

impl InjectedError {
    pub fn parse(error_type: &str) -> Self {
        match error_type {
            "database_timeout" => InjectedError::DatabaseTimeout,
            "validation_error" => InjectedError::ValidationError,
            other => InjectedError::Unknown(other.to_string()),
        }
    }
}

/// Audit key for one trigger invocation: `ERROR-<unix milliseconds>`.
///
/// Triggers landing in the same millisecond share one audit trail.
pub fn error_test_id(now: DateTime<Utc>) -> String {
    format!("ERROR-{}", now.timestamp_millis())
}

/// Human form of the injected delay for audit messages.
pub fn describe_delay(delay: Duration) -> String {
    let millis = delay.as_millis();
    if millis % 1000 == 0 {
        format!("{} second", millis / 1000)
    } else {
        format!("{} ms", millis)
    }
}
