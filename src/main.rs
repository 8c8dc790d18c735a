//! Prior Authorization API
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ net::listener ──▶ http::server (axum + tower-http middleware)
//!                                     │
//!                                     ▼
//!                              pipeline::RequestPipeline
//!                     ids → validation → persistence (store::Store)
//!                                     │
//!               ┌─────────────────────┼─────────────────────┐
//!               ▼                     ▼                     ▼
//!        observability::audit   observability::metrics  observability::tracing
//!        (audit rows in store)  (GET /metrics)          (batch export → OTLP)
//! ```

use clap::Parser;
use std::path::PathBuf;

use prior_auth_api::config::loader::{default_config, load_config};
use prior_auth_api::config::watcher::ConfigWatcher;
use prior_auth_api::http::HttpServer;
use prior_auth_api::lifecycle::{signals, startup, Shutdown};
use prior_auth_api::net::listener;
use prior_auth_api::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "prior-auth-api", version, about = "Prior authorization API server")]
struct Args {
    /// TOML configuration file. Reloaded on change.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.observability.environment,
        "prior-auth-api starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.backend,
        tracing_enabled = config.tracing.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let services = startup::build_services(&config)?;
    let listener = listener::bind(&config.listener).await?;

    // The watcher stops when dropped, so keep it for the life of the server.
    let (_watcher, updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), Some(updates))
        }
        None => (None, None),
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, services);
    let server_task = tokio::spawn(server.run(listener, updates, shutdown.subscribe()));

    signals::wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
