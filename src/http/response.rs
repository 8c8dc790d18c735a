//! Error responses.
//!
//! Every failure leaves the service as JSON `{"detail": ..., "reason": ...}`.
//!
//! | Source | Status | Reason |
//! |--------|--------|--------|
//! | malformed body / missing field | 400 or 422 | `invalid_body` |
//! | field length out of range | 422 | `field_length` |
//! | `PipelineError::Validation` | 400 | validation reason code |
//! | `PipelineError::Timeout` | 503 | `timeout` |
//! | `PipelineError::Persistence` | 503 | `store_unavailable` |
//! | unknown route, metrics disabled | 404 | `not_found` |

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::FieldError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub reason: String,
}

#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    Schema {
        status: StatusCode,
        reason: &'static str,
        detail: String,
    },
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Schema { status, .. } => *status,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Pipeline(e) => ErrorBody {
                detail: e.to_string(),
                reason: e.reason_code().to_string(),
            },
            ApiError::Schema { reason, detail, .. } => ErrorBody {
                detail: detail.clone(),
                reason: reason.to_string(),
            },
            ApiError::NotFound => ErrorBody {
                detail: "Not Found".to_string(),
                reason: "not_found".to_string(),
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<FieldError> for ApiError {
    fn from(e: FieldError) -> Self {
        ApiError::Schema {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            reason: "field_length",
            detail: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Schema {
            status: rejection.status(),
            reason: "invalid_body",
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = ?self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
