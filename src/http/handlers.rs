//! Route handlers. Thin adapters from HTTP to `RequestPipeline`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::http::response::ApiError;
use crate::models::{
    AuditTrail, ErrorAck, ErrorInjection, HealthReport, PriorAuthRecord, PriorAuthRequest,
    ServiceInfo,
};
use crate::pipeline::RequestPipeline;

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: RequestPipeline,
    pub metrics_enabled: bool,
}

pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.pipeline.service_info())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.pipeline.health().await)
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if !state.metrics_enabled {
        return Err(ApiError::NotFound);
    }
    let body = state.pipeline.observability().metrics.snapshot();
    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body))
}

pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<PriorAuthRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PriorAuthRecord>), ApiError> {
    let Json(candidate) = payload?;
    candidate.check_fields()?;

    let record = state.pipeline.submit(candidate).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<PriorAuthRecord>>, ApiError> {
    Ok(Json(state.pipeline.list_requests().await?))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<AuditTrail>, ApiError> {
    Ok(Json(state.pipeline.audit_trail(&request_id).await?))
}

pub async fn trigger_error(
    State(state): State<AppState>,
    payload: Result<Json<ErrorInjection>, JsonRejection>,
) -> Result<Json<ErrorAck>, ApiError> {
    let Json(injection) = payload?;
    Ok(Json(state.pipeline.trigger_test_error(&injection.error_type).await?))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
