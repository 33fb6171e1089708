//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (derive ClientKey from peer / trusted proxy headers)
//!     → rate_limit.rs (per-client token bucket, 429 on exhaustion)
//!     → cors.rs (trusted-origin CORS headers, preflight)
//!     → Pass to authentication
//! ```
//!
//! # Design Decisions
//! - Admission runs before identity resolution so floods never reach the
//!   user store
//! - Limiter state is process-local; global limits belong to an external
//!   layer
//! - No trust in client-supplied forwarding headers unless configured

pub mod client_ip;
pub mod cors;
pub mod rate_limit;

pub use client_ip::ClientKey;
pub use rate_limit::{ClientLimiterRegistry, RateAdmission, TokenBucket};
