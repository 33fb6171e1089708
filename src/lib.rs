//! Request admission and identity pipeline for HTTP APIs.
//!
//! Per-client rate limiting, bearer-token authentication and layered
//! authorization, composed as axum/tower middleware in front of a
//! business router.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GateError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;
