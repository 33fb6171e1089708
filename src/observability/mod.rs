//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (pipeline counters + metrics facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → GET /debug/vars (JSON snapshot)
//!     → Prometheus scrape (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span via `x-request-id`
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{track_metrics, MetricsSnapshot, PipelineMetrics};
