//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment (OTEL_*, ENV, DATABASE_URL)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to the server and pipeline at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the hot-reloadable sections (latency injection)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener, store and tracing settings require a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AppConfig, ErrorInjectionConfig, LatencyInjectionConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, StoreBackend, StoreConfig, TimeoutConfig, TlsConfig, TracingConfig,
};
