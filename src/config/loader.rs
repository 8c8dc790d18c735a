//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{AppConfig, StoreBackend};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: AppConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn default_config() -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay the conventional deployment variables onto `config`.
///
/// | Variable | Effect |
/// |----------|--------|
/// | `OTEL_EXPORTER_OTLP_ENDPOINT` | `tracing.otlp_endpoint` |
/// | `OTEL_EXPORTER_OTLP_HEADERS` | `tracing.otlp_headers` |
/// | `OTEL_SERVICE_NAME` | `observability.service_name` |
/// | `ENV` | `observability.environment` |
/// | `DATABASE_URL` | sqlite backend at that path (`sqlite://` prefix optional) |
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(endpoint) = non_empty("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.tracing.otlp_endpoint = Some(endpoint);
    }
    if let Some(headers) = non_empty("OTEL_EXPORTER_OTLP_HEADERS") {
        config.tracing.otlp_headers = headers;
    }
    if let Some(name) = non_empty("OTEL_SERVICE_NAME") {
        config.observability.service_name = name;
    }
    if let Some(env) = non_empty("ENV") {
        config.observability.environment = env;
    }
    if let Some(url) = non_empty("DATABASE_URL") {
        let path = url.strip_prefix("sqlite://").unwrap_or(&url).to_string();
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = path;
    }
}
