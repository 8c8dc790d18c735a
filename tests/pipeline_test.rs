//! Pipeline behavior against the memory store and in-memory span sink.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use prior_auth_api::error::{PipelineError, ValidationReason};
use prior_auth_api::models::{AuditEventType, RequestStatus};
use prior_auth_api::observability::metrics::{
    sample_value, DATABASE_OPERATIONS_TOTAL, REQUESTS_TOTAL, VALIDATION_FAILURES_TOTAL,
};
use opentelemetry::Value;
use opentelemetry_sdk::trace::SpanData;
use prior_auth_api::config::AppConfig;
use prior_auth_api::observability::tracing::{is_error, is_root, span_attribute};
use prior_auth_api::observability::Observability;
use prior_auth_api::pipeline::spans;
use prior_auth_api::store::{Store, StoreError};

mod common;
use common::{
    finished_spans, request_with_npi, test_config, test_pipeline, test_pipeline_with,
    valid_request, TestPipeline,
};

fn setup() -> TestPipeline {
    test_pipeline(&test_config(0))
}

async fn flushed_spans(t: &TestPipeline) -> Vec<SpanData> {
    finished_spans(&t.pipeline.observability().tracer, &t.spans).await
}

fn state_of(span: &SpanData) -> Option<String> {
    span_attribute(span, spans::STATE_ATTRIBUTE).map(|v| v.to_string())
}

fn is_request_id(raw: &str) -> bool {
    raw.strip_prefix("PA-")
        .map(|digits| digits.len() == 5 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[tokio::test]
async fn test_valid_submission_scenario() {
    let t = setup();
    let record = t.pipeline.submit(valid_request("M10001")).await.unwrap();

    assert!(is_request_id(record.request_id.as_str()));
    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(record.member_id, "M10001");
    assert_eq!(record.provider_npi, "1234567890");
    assert_eq!(record.diagnosis_code, "E11.9");
    assert_eq!(record.requested_service, "MRI_BRAIN");
}

#[tokio::test]
async fn test_identifiers_strictly_increase() {
    let t = setup();
    let mut previous = 0;
    for i in 0..7 {
        let record = t
            .pipeline
            .submit(valid_request(&format!("M1000{}", i)))
            .await
            .unwrap();
        let sequence = record.request_id.sequence().unwrap();
        assert!(sequence > previous);
        previous = sequence;
    }
    assert_eq!(previous, 7);
}

#[tokio::test]
async fn test_invalid_npis_are_rejected_without_persistence() {
    let t = setup();
    for npi in ["BAD_NPI", "ABCDEFGHIJ", "123", "12345678901", "", "123456789O"] {
        let err = t
            .pipeline
            .submit(request_with_npi("M20001", npi))
            .await
            .unwrap_err();
        match &err {
            PipelineError::Validation { reason, message } => {
                assert_eq!(*reason, ValidationReason::InvalidNpiFormat);
                assert_eq!(message, "Provider NPI must be exactly 10 digits");
            }
            other => panic!("unexpected error for {:?}: {}", npi, other),
        }
        assert_eq!(err.status_code(), 400);
    }
    assert_eq!(t.store.count_requests().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bad_npi_audit_trail() {
    let t = setup();
    t.pipeline
        .submit(request_with_npi("M20001", "BAD_NPI"))
        .await
        .unwrap_err();

    // no record was stored, so the id is reused by the next submission
    let trail = t.pipeline.audit_trail("PA-00001").await.unwrap();
    let kinds: Vec<AuditEventType> = trail.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![AuditEventType::RequestReceived, AuditEventType::ValidationFailed]
    );
    assert_eq!(trail.events[1].message, "Invalid NPI format: BAD_NPI");
}

#[tokio::test]
async fn test_success_audit_trail_in_causal_order() {
    let t = setup();
    let record = t.pipeline.submit(valid_request("M10001")).await.unwrap();

    let trail = t
        .pipeline
        .audit_trail(record.request_id.as_str())
        .await
        .unwrap();
    let kinds: Vec<AuditEventType> = trail.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::RequestReceived,
            AuditEventType::ValidationPassed,
            AuditEventType::SavedToDatabase,
            AuditEventType::StatusPending,
        ]
    );
    assert_eq!(trail.events[0].message, "Submitted by provider NPI 1234567890");
    assert!(trail
        .events
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_outcome_counters() {
    let t = setup();
    for i in 0..4 {
        t.pipeline
            .submit(valid_request(&format!("M3000{}", i)))
            .await
            .unwrap();
    }
    for npi in ["BAD_NPI", "123"] {
        t.pipeline
            .submit(request_with_npi("M40001", npi))
            .await
            .unwrap_err();
    }

    let snapshot = t.metrics.snapshot();
    assert_eq!(
        sample_value(
            &snapshot,
            REQUESTS_TOTAL,
            &[("status", "success"), ("endpoint", "/prior-auth/submit")]
        ),
        Some(4.0)
    );
    assert_eq!(
        sample_value(
            &snapshot,
            REQUESTS_TOTAL,
            &[("status", "validation_error"), ("endpoint", "/prior-auth/submit")]
        ),
        Some(2.0)
    );
    assert_eq!(
        sample_value(
            &snapshot,
            VALIDATION_FAILURES_TOTAL,
            &[("failure_type", "invalid_npi_format")]
        ),
        Some(2.0)
    );
    assert_eq!(
        sample_value(
            &snapshot,
            DATABASE_OPERATIONS_TOTAL,
            &[("operation_type", "insert_request")]
        ),
        Some(4.0)
    );
    // 4 successes x 4 events + 2 failures x 2 events
    assert_eq!(
        sample_value(
            &snapshot,
            DATABASE_OPERATIONS_TOTAL,
            &[("operation_type", "insert_log")]
        ),
        Some(20.0)
    );
}

#[tokio::test]
async fn test_span_tree_for_success() {
    let t = setup();
    let record = t.pipeline.submit(valid_request("M10001")).await.unwrap();
    let recorded = flushed_spans(&t).await;

    let root = recorded.iter().find(|s| s.name == spans::SUBMIT).unwrap();
    assert!(is_root(root));
    assert!(!is_error(root));
    assert_eq!(state_of(root).as_deref(), Some("PERSISTED"));
    assert_eq!(
        span_attribute(root, "request.id"),
        Some(&Value::from(record.request_id.to_string()))
    );
    assert_eq!(
        span_attribute(root, "request.provider_npi"),
        Some(&Value::from("1234567890"))
    );

    for name in [spans::VALIDATE_NPI, spans::DATABASE_INSERT] {
        let child = recorded.iter().find(|s| s.name == name).unwrap();
        assert_eq!(child.parent_span_id, root.span_context.span_id());
        assert_eq!(child.span_context.trace_id(), root.span_context.trace_id());
        assert!(!is_error(child));
        assert!(child.start_time >= root.start_time && child.end_time <= root.end_time);
    }
    assert!(recorded.iter().all(|s| s.name != spans::SYNTHETIC_DELAY));
}

#[tokio::test]
async fn test_span_tree_for_validation_failure() {
    let t = setup();
    t.pipeline
        .submit(request_with_npi("M20001", "BAD_NPI"))
        .await
        .unwrap_err();
    let recorded = flushed_spans(&t).await;

    let root = recorded.iter().find(|s| s.name == spans::SUBMIT).unwrap();
    assert!(is_error(root));
    assert_eq!(state_of(root).as_deref(), Some("VALIDATION_FAILED"));

    let validate = recorded.iter().find(|s| s.name == spans::VALIDATE_NPI).unwrap();
    assert!(is_error(validate));
    assert!(recorded.iter().all(|s| s.name != spans::DATABASE_INSERT));
}

#[tokio::test]
async fn test_persist_failure() {
    let t = setup();
    t.store.set_fail_inserts(true);

    let err = t.pipeline.submit(valid_request("M10001")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Persistence(_)));
    assert_eq!(err.reason_code(), "store_unavailable");

    let trail = t.pipeline.audit_trail("PA-00001").await.unwrap();
    let kinds: Vec<AuditEventType> = trail.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![AuditEventType::RequestReceived, AuditEventType::ValidationPassed]
    );

    let snapshot = t.metrics.snapshot();
    assert_eq!(sample_value(&snapshot, REQUESTS_TOTAL, &[("endpoint", "/prior-auth/submit")]), None);

    let recorded = flushed_spans(&t).await;
    let root = recorded.iter().find(|s| s.name == spans::SUBMIT).unwrap();
    assert_eq!(state_of(root).as_deref(), Some("PERSIST_FAILED"));
    assert!(is_error(root));
    let insert = recorded.iter().find(|s| s.name == spans::DATABASE_INSERT).unwrap();
    assert!(is_error(insert));
}

#[tokio::test]
async fn test_id_failure_aborts_before_audit() {
    let t = setup();
    t.store.set_unavailable(true);

    let err = t.pipeline.submit(valid_request("M10001")).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Persistence(StoreError::Unavailable(_))
    ));

    t.store.set_unavailable(false);
    assert_eq!(t.store.audit_len(), 0);

    let recorded = flushed_spans(&t).await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(state_of(&recorded[0]).as_deref(), Some("ID_FAILED"));
    assert!(is_error(&recorded[0]));
}

#[tokio::test]
async fn test_audit_outage_does_not_fail_submission() {
    let t = setup();
    t.store.set_fail_audit_writes(true);

    let record = t.pipeline.submit(valid_request("M10001")).await.unwrap();
    assert_eq!(record.request_id.as_str(), "PA-00001");
    assert_eq!(t.store.audit_len(), 0);
}

#[tokio::test]
async fn test_export_outage_does_not_fail_submission() {
    let mut config: AppConfig = test_config(0);
    config.tracing.otlp_endpoint = Some("http://127.0.0.1:9".to_string());
    config.tracing.export_timeout_secs = 1;
    let observability = Observability::from_config(&config).unwrap();
    let t = test_pipeline_with(&config, observability, Default::default());

    let record = t.pipeline.submit(valid_request("M10001")).await.unwrap();
    assert_eq!(record.request_id.as_str(), "PA-00001");

    let started = Instant::now();
    let tracer = &t.pipeline.observability().tracer;
    tracer.force_flush().await;
    tracer.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(t.store.count_requests().await.unwrap(), 1);
}

#[tokio::test]
async fn test_synthetic_delay_for_configured_member() {
    let t = setup();
    let started = Instant::now();
    t.pipeline.submit(valid_request("M99999")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));

    let recorded = flushed_spans(&t).await;
    let delay = recorded
        .iter()
        .find(|s| s.name == spans::SYNTHETIC_DELAY)
        .unwrap();
    assert_eq!(span_attribute(delay, "delay_ms"), Some(&Value::I64(200)));
    assert_eq!(
        span_attribute(delay, "reason"),
        Some(&Value::from("Simulating database contention"))
    );
}

#[tokio::test]
async fn test_list_newest_first_and_fields_round_trip() {
    let t = setup();
    let submitted = [
        valid_request("M10001"),
        request_with_npi("M10002", "9876543210"),
        valid_request("M10003"),
    ];
    for candidate in &submitted {
        t.pipeline.submit(candidate.clone()).await.unwrap();
    }

    let records = t.pipeline.list_requests().await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.request_id.as_str()).collect();
    assert_eq!(ids, vec!["PA-00003", "PA-00002", "PA-00001"]);

    for (record, candidate) in records.iter().rev().zip(submitted.iter()) {
        assert_eq!(record.member_id, candidate.member_id);
        assert_eq!(record.provider_npi, candidate.provider_npi);
        assert_eq!(record.diagnosis_code, candidate.diagnosis_code);
        assert_eq!(record.requested_service, candidate.requested_service);
    }
}

#[tokio::test]
async fn test_list_failure_surfaces_persistence_error() {
    let t = setup();
    t.store.set_unavailable(true);
    assert!(matches!(
        t.pipeline.list_requests().await,
        Err(PipelineError::Persistence(_))
    ));
}

#[tokio::test]
async fn test_injected_timeout() {
    let t = setup();
    let started = Instant::now();
    let err = t
        .pipeline
        .trigger_test_error("database_timeout")
        .await
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(matches!(err, PipelineError::Timeout { .. }));
    assert_eq!(err.status_code(), 503);

    let recorded = flushed_spans(&t).await;
    let root = recorded
        .iter()
        .find(|s| s.name == spans::TRIGGER_TEST_ERROR)
        .unwrap();
    assert!(is_error(root));
    assert_eq!(
        span_attribute(root, "error.type"),
        Some(&Value::from("database_timeout"))
    );
    let error_id = span_attribute(root, "error.id").unwrap().to_string();
    assert!(error_id.starts_with("ERROR-"));

    let trail = t.pipeline.audit_trail(&error_id).await.unwrap();
    let kinds: Vec<AuditEventType> = trail.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::ErrorTestStarted,
            AuditEventType::DatabaseSlow,
            AuditEventType::DatabaseTimeout,
        ]
    );

    assert_eq!(
        sample_value(
            &t.metrics.snapshot(),
            REQUESTS_TOTAL,
            &[("status", "timeout_error"), ("endpoint", "/prior-auth/test/errors")]
        ),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_injected_validation_error_is_immediate() {
    let t = setup();
    let started = Instant::now();
    let err = t
        .pipeline
        .trigger_test_error("validation_error")
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(300));
    match err {
        PipelineError::Validation { reason, .. } => {
            assert_eq!(reason, ValidationReason::MissingRequiredField)
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_unknown_error_type_is_echoed() {
    let t = setup();
    let ack = t.pipeline.trigger_test_error("disk_full").await.unwrap();
    assert_eq!(ack.error_triggered, "disk_full");
}

#[tokio::test]
async fn test_concurrent_submissions_never_share_a_stored_id() {
    let t = setup();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = t.pipeline.clone();
            tokio::spawn(async move { pipeline.submit(valid_request(&format!("M5000{}", i))).await })
        })
        .collect();

    let mut stored = HashSet::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => assert!(stored.insert(record.request_id)),
            Err(PipelineError::Persistence(StoreError::Duplicate(_))) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(t.store.count_requests().await.unwrap(), stored.len() as u64);
}
