//! Prior authorization API with an integrated audit, trace and metric pipeline.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod models;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod store;

pub use config::AppConfig;
pub use error::{ObservabilityWriteError, PipelineError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::RequestPipeline;
