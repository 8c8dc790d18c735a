//! Error taxonomy.
//!
//! | Error | Cause | Status equivalent |
//! |-------|-------|-------------------|
//! | `PipelineError::Validation` | client input breaks a business rule | 400 |
//! | `PipelineError::Timeout` | service-side or injected timeout | 503 |
//! | `PipelineError::Persistence` | store unavailable or query failure | 503 at the HTTP edge |
//! | `ObservabilityWriteError` | audit / trace write failure | never surfaced, logged only |

use thiserror::Error;

use crate::store::StoreError;

/// Machine-readable reason codes for validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    /// Provider NPI is not exactly 10 ASCII digits.
    InvalidNpiFormat,
    /// Raised by the error-injection endpoint.
    MissingRequiredField,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::InvalidNpiFormat => "invalid_npi_format",
            ValidationReason::MissingRequiredField => "missing_required_field",
        }
    }
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{message}")]
    Validation {
        reason: ValidationReason,
        message: String,
    },

    #[error("{message}")]
    Timeout { message: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl PipelineError {
    pub fn validation(reason: ValidationReason, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            reason,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        PipelineError::Timeout {
            message: message.into(),
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Validation { .. } => 400,
            PipelineError::Timeout { .. } => 503,
            PipelineError::Persistence(_) => 503,
        }
    }

    /// Stable reason code carried in error responses.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PipelineError::Validation { reason, .. } => reason.as_str(),
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::Persistence(_) => "store_unavailable",
        }
    }
}

/// Failure while writing to an observability channel.
///
/// Always handled where it occurs; request outcomes never depend on it.
#[derive(Debug, Error)]
pub enum ObservabilityWriteError {
    #[error("audit write failed: {0}")]
    Audit(#[source] StoreError),

    #[error("failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("OTLP exporter setup thread panicked")]
    ExporterSetup,
}
