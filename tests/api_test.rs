//! End-to-end tests over a real listener, driven through the client SDK.

mod common;

use std::time::{Duration, Instant};

use common::{finished_spans, test_config, TestServer};
use prior_auth_api::observability::metrics::{
    endpoints, sample_value, DATABASE_OPERATIONS_TOTAL, REQUESTS_TOTAL, VALIDATION_FAILURES_TOTAL,
};
use prior_auth_client::{ClientError, Submission};
use reqwest::StatusCode;

fn submission(member_id: &str, npi: &str) -> Submission {
    Submission::new(member_id, npi, "E11.9", "MRI_BRAIN")
}

#[tokio::test]
async fn test_service_info_and_health() {
    let server = TestServer::start(test_config(28281)).await;

    let info = server.client.service_info().await.unwrap();
    assert_eq!(info.message, "Prior Authorization API");
    assert_eq!(info.status, "running");

    let health = server.client.health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.database, "connected");

    server.store.set_unavailable(true);
    let health = server.client.health().await.unwrap();
    assert_eq!(health.status, "unhealthy");
    assert_eq!(health.database, "disconnected");

    server.stop().await;
}

#[tokio::test]
async fn test_submit_returns_created_record() {
    let server = TestServer::start(test_config(28282)).await;

    let record = server
        .client
        .submit(&submission("M10001", "1234567890"))
        .await
        .unwrap();
    assert_eq!(record.request_id, "PA-00001");
    assert_eq!(record.member_id, "M10001");
    assert_eq!(record.status, "pending");

    let second = server
        .client
        .submit(&submission("M10002", "9876543210"))
        .await
        .unwrap();
    assert_eq!(second.request_id, "PA-00002");

    server.stop().await;
}

#[tokio::test]
async fn test_bad_npi_is_rejected_with_reason() {
    let server = TestServer::start(test_config(28283)).await;

    let err = server
        .client
        .submit(&submission("M10001", "12345"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.reason(), Some("invalid_npi_format"));
    match &err {
        ClientError::Api { detail, .. } => {
            assert_eq!(detail, "Provider NPI must be exactly 10 digits")
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(server.client.list_requests().await.unwrap().is_empty());

    let trail = server.client.audit_trail("PA-00001").await.unwrap();
    assert_eq!(
        trail.event_types(),
        vec!["REQUEST_RECEIVED", "VALIDATION_FAILED"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_field_length_is_unprocessable() {
    let server = TestServer::start(test_config(28284)).await;

    let long_member = "M".repeat(51);
    let err = server
        .client
        .submit(&submission(&long_member, "1234567890"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(err.reason(), Some("field_length"));

    // Schema rejections never reach the pipeline.
    let snapshot = server.metrics.snapshot();
    assert_eq!(
        sample_value(&snapshot, REQUESTS_TOTAL, &[("endpoint", endpoints::SUBMIT)]),
        None
    );

    server.stop().await;
}

#[tokio::test]
async fn test_list_and_audit_trail() {
    let server = TestServer::start(test_config(28285)).await;

    for member in ["M1", "M2", "M3"] {
        server
            .client
            .submit(&submission(member, "1234567890"))
            .await
            .unwrap();
    }

    let listed = server.client.list_requests().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.request_id.as_str()).collect();
    assert_eq!(ids, vec!["PA-00003", "PA-00002", "PA-00001"]);

    let trail = server.client.audit_trail("PA-00002").await.unwrap();
    assert_eq!(trail.request_id, "PA-00002");
    assert_eq!(
        trail.event_types(),
        vec![
            "REQUEST_RECEIVED",
            "VALIDATION_PASSED",
            "SAVED_TO_DATABASE",
            "STATUS_PENDING"
        ]
    );

    let empty = server.client.audit_trail("PA-99999").await.unwrap();
    assert!(empty.events.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let server = TestServer::start(test_config(28286)).await;
    server.store.set_fail_inserts(true);

    let err = server
        .client
        .submit(&submission("M10001", "1234567890"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.reason(), Some("store_unavailable"));

    server.stop().await;
}

#[tokio::test]
async fn test_triggered_errors() {
    let server = TestServer::start(test_config(28287)).await;

    let started = Instant::now();
    let err = server
        .client
        .trigger_error("database_timeout")
        .await
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.reason(), Some("timeout"));

    let err = server
        .client
        .trigger_error("validation_error")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.reason(), Some("missing_required_field"));

    let ack = server.client.trigger_error("cosmic_ray").await.unwrap();
    assert_eq!(ack.error_triggered, "cosmic_ray");

    server.stop().await;
}

#[tokio::test]
async fn test_metrics_exposition() {
    let server = TestServer::start(test_config(28288)).await;

    server
        .client
        .submit(&submission("M10001", "1234567890"))
        .await
        .unwrap();
    let _ = server.client.submit(&submission("M10002", "abc")).await;

    let text = server.client.metrics().await.unwrap();
    assert_eq!(
        sample_value(
            &text,
            REQUESTS_TOTAL,
            &[("status", "success"), ("endpoint", endpoints::SUBMIT)]
        ),
        Some(1.0)
    );
    assert_eq!(
        sample_value(
            &text,
            REQUESTS_TOTAL,
            &[("status", "validation_error"), ("endpoint", endpoints::SUBMIT)]
        ),
        Some(1.0)
    );
    assert_eq!(
        sample_value(
            &text,
            VALIDATION_FAILURES_TOTAL,
            &[("failure_type", "invalid_npi_format")]
        ),
        Some(1.0)
    );
    assert_eq!(
        sample_value(
            &text,
            DATABASE_OPERATIONS_TOTAL,
            &[("operation_type", "insert_request")]
        ),
        Some(1.0)
    );
    assert!(text.contains("prior_auth_request_duration_seconds_bucket"));

    server.stop().await;
}

#[tokio::test]
async fn test_metrics_endpoint_disabled() {
    let mut config = test_config(28289);
    config.observability.metrics_enabled = false;
    let server = TestServer::start(config).await;

    let err = server.client.metrics().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));

    server.stop().await;
}

#[tokio::test]
async fn test_request_id_header() {
    let server = TestServer::start(test_config(28290)).await;
    let http = reqwest::Client::new();
    let url = format!("http://{}/health", server.addr);

    let echoed = http
        .get(&url)
        .header("x-request-id", "trace-me-42")
        .send()
        .await
        .unwrap();
    assert_eq!(
        echoed.headers().get("x-request-id").unwrap(),
        "trace-me-42"
    );

    let generated = http.get(&url).send().await.unwrap();
    let id = generated
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = TestServer::start(test_config(28291)).await;

    let response = reqwest::get(format!("http://{}/prior-auth/nothing", server.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_request_spans_reach_exporter() {
    let server = TestServer::start(test_config(28292)).await;
    server
        .client
        .submit(&submission("M10001", "1234567890"))
        .await
        .unwrap();

    let names: Vec<String> = finished_spans(&server.tracer, &server.spans)
        .await
        .into_iter()
        .map(|s| s.name.to_string())
        .collect();
    assert!(names.iter().any(|n| n == "submit_prior_auth"));
    assert!(names.iter().any(|n| n == "validate_npi"));
    assert!(names.iter().any(|n| n == "database_insert"));
    server.stop().await;
}
