//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use prior_auth_api::config::AppConfig;
use prior_auth_api::http::HttpServer;
use prior_auth_api::lifecycle::startup::{build_services_with, Services};
use prior_auth_api::lifecycle::Shutdown;
use prior_auth_api::models::PriorAuthRequest;
use prior_auth_api::net::listener;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData};
use prior_auth_api::observability::{MetricsRegistry, Observability, Tracer};
use prior_auth_api::pipeline::RequestPipeline;
use prior_auth_api::store::MemoryStore;
use prior_auth_client::PriorAuthClient;

pub fn valid_request(member_id: &str) -> PriorAuthRequest {
    PriorAuthRequest {
        member_id: member_id.to_string(),
        provider_npi: "1234567890".to_string(),
        diagnosis_code: "E11.9".to_string(),
        requested_service: "MRI_BRAIN".to_string(),
    }
}

pub fn request_with_npi(member_id: &str, npi: &str) -> PriorAuthRequest {
    PriorAuthRequest {
        provider_npi: npi.to_string(),
        ..valid_request(member_id)
    }
}

/// A pipeline over a fresh memory store and in-memory span sink.
pub struct TestPipeline {
    pub pipeline: RequestPipeline,
    pub store: Arc<MemoryStore>,
    pub spans: InMemorySpanExporter,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn test_pipeline(config: &AppConfig) -> TestPipeline {
    let (observability, spans) = Observability::in_memory();
    test_pipeline_with(config, observability, spans)
}

/// A pipeline over a fresh memory store with caller-supplied observability.
pub fn test_pipeline_with(
    config: &AppConfig,
    observability: Observability,
    spans: InMemorySpanExporter,
) -> TestPipeline {
    let store = Arc::new(MemoryStore::new());
    let metrics = observability.metrics.clone();
    let Services { pipeline, .. } = build_services_with(config, store.clone(), observability);
    TestPipeline {
        pipeline,
        store,
        spans,
        metrics,
    }
}

/// Flush the tracer's batch processor and return every span exported so far.
pub async fn finished_spans(tracer: &Tracer, spans: &InMemorySpanExporter) -> Vec<SpanData> {
    tracer.force_flush().await;
    spans.get_finished_spans().unwrap()
}

/// Config for tests: short synthetic delay for M99999, short injected timeout.
pub fn test_config(port: u16) -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = format!("127.0.0.1:{}", port);
    config.latency_injection.member_ids = vec!["M99999".to_string()];
    config.latency_injection.delay_ms = 200;
    config.error_injection.timeout_delay_ms = 300;
    config
}

/// A running server on a fixed local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: PriorAuthClient,
    pub store: Arc<MemoryStore>,
    pub spans: InMemorySpanExporter,
    pub tracer: Tracer,
    pub metrics: Arc<MetricsRegistry>,
    shutdown: Shutdown,
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub async fn start(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (observability, spans) = Observability::in_memory();
        let metrics = observability.metrics.clone();
        let tracer = observability.tracer.clone();
        let services = build_services_with(&config, store.clone(), observability);

        let listener = listener::bind(&config.listener).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(config, services);
        let handle = tokio::spawn(server.run(listener, None, shutdown.subscribe()));

        Self {
            addr,
            client: PriorAuthClient::new(&format!("http://{}", addr)),
            store,
            spans,
            tracer,
            metrics,
            shutdown,
            handle,
        }
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}
