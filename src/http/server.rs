//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request id, tracing, timeout, body limit)
//! - Serve plain TCP or TLS until shutdown
//! - Apply hot-reloadable configuration sections
//! - Drain the span exporter on exit

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::http::handlers::{self, AppState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestSpan};
use crate::lifecycle::startup::Services;
use crate::net::tls::load_tls_config;
use crate::pipeline::latency::MemberLatencyRule;

/// Grace period for in-flight TLS connections after shutdown is requested.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for the prior authorization API.
pub struct HttpServer {
    config: AppConfig,
    state: AppState,
    latency_rule: Arc<MemberLatencyRule>,
}

impl HttpServer {
    pub fn new(config: AppConfig, services: Services) -> Self {
        let state = AppState {
            pipeline: services.pipeline,
            metrics_enabled: config.observability.metrics_enabled,
        };
        Self {
            config,
            state,
            latency_rule: services.latency_rule,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
            .layer(propagate_request_id_layer())
            .layer(RequestBodyLimitLayer::new(self.config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeouts.request_secs,
            )));

        Router::new()
            .route("/", get(handlers::service_info))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .route("/prior-auth/submit", post(handlers::submit))
            .route("/prior-auth/requests", get(handlers::list_requests))
            .route(
                "/prior-auth/requests/{request_id}/logs",
                get(handlers::audit_trail),
            )
            .route("/prior-auth/test/errors", post(handlers::trigger_error))
            .fallback(handlers::not_found)
            .with_state(self.state.clone())
            .layer(middleware)
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configuration received on `config_updates` retunes latency injection;
    /// other sections need a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<AppConfig>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let app = self.router();

        if let Some(mut updates) = config_updates {
            let rule = self.latency_rule.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    rule.update(config.latency_injection);
                    tracing::info!("Configuration reloaded");
                }
            });
        }

        match &self.config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await?;
                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    shutdown_handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
                });

                tracing::info!(address = %addr, "HTTPS server starting");
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Shutdown signal received");
                    })
                    .await?;
            }
        }

        let tracer = &self.state.pipeline.observability().tracer;
        tracer.force_flush().await;
        tracer.shutdown().await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
