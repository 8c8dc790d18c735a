//! Network layer.
//!
//! # Data Flow
//! ```text
//! listener.rs (bind configured address)
//!     → tls.rs (optional certificate loading)
//!     → http::server (plain axum or axum-server with rustls)
//! ```

pub mod listener;
pub mod tls;
