//! Request pipeline composition.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → track_metrics      (outermost: counts every response, including rejections)
//!     → recovery           (panic → 500, Connection: close)
//!     → request id + trace span
//!     → CORS               (only when trusted origins are configured)
//!     → timeout
//!     → rate admission     (429)
//!     → authentication     (401 on bad credentials, Principal attached)
//!     → route gates        (401/403, attached per route by the router)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - The order above is fixed; `Pipeline::wrap` is the only place it is built
//! - Each stage short-circuits with a `GateError` response on rejection

pub mod recovery;

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, middleware, Router};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{authenticate_middleware, Authenticator, UserStore};
use crate::config::GatewayConfig;
use crate::http::request::{request_id, request_id_layers};
use crate::observability::metrics::{track_metrics, PipelineMetrics};
use crate::security::cors::cors_layer;
use crate::security::rate_limit::{rate_limit_middleware, ClientLimiterRegistry, RateAdmission};

pub use recovery::recovery_layer;

/// The shared middleware chain placed in front of every route.
#[derive(Clone)]
pub struct Pipeline {
    metrics: Arc<PipelineMetrics>,
    admission: RateAdmission,
    authenticator: Authenticator,
    cors: Option<CorsLayer>,
    request_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<ClientLimiterRegistry>,
        users: Arc<dyn UserStore>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            metrics,
            admission: RateAdmission {
                registry,
                client_ip: config.client_ip.clone(),
            },
            authenticator: Authenticator::new(users),
            cors: cors_layer(&config.cors),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    /// Wrap a business router in the full chain.
    ///
    /// Layers added later run earlier, so this reads inside-out.
    #[allow(deprecated)]
    pub fn wrap(&self, app: Router) -> Router {
        let (set_request_id, propagate_request_id) = request_id_layers();

        let mut app = app
            .layer(middleware::from_fn_with_state(
                self.authenticator.clone(),
                authenticate_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.admission.clone(),
                rate_limit_middleware,
            ))
            .layer(TimeoutLayer::new(self.request_timeout));

        if let Some(cors) = &self.cors {
            app = app.layer(cors.clone());
        }

        app.layer(propagate_request_id)
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id(req),
                )
            }))
            .layer(set_request_id)
            .layer(recovery_layer())
            .layer(middleware::from_fn_with_state(self.metrics.clone(), track_metrics))
    }
}
