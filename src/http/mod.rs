//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection (peer address kept via ConnectInfo)
//!     → server.rs (axum serve, graceful shutdown)
//!     → request.rs (x-request-id)
//!     → pipeline (admission, identity)
//!     → routes.rs (gated reference handlers)
//! ```

pub mod request;
pub mod routes;
pub mod server;

pub use request::X_REQUEST_ID;
pub use routes::{build_routes, AppState};
pub use server::HttpServer;
