//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the limiter registry, metrics and routes from config
//! - Wrap the routes in the request pipeline
//! - Serve with peer addresses available to the limiter
//! - Drain on shutdown, then stop the limiter sweep

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::auth::{PermissionStore, UserStore};
use crate::config::GatewayConfig;
use crate::http::routes::{build_routes, AppState};
use crate::lifecycle::Shutdown;
use crate::observability::metrics::PipelineMetrics;
use crate::pipeline::Pipeline;
use crate::security::rate_limit::ClientLimiterRegistry;

/// HTTP server for the gatekeeper.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<ClientLimiterRegistry>,
    metrics: Arc<PipelineMetrics>,
}

impl HttpServer {
    pub fn new(
        config: GatewayConfig,
        users: Arc<dyn UserStore>,
        permissions: Arc<dyn PermissionStore>,
    ) -> Self {
        let registry = Arc::new(ClientLimiterRegistry::new(&config.rate_limit));
        let metrics = Arc::new(PipelineMetrics::new());

        let pipeline = Pipeline::new(&config, registry.clone(), users, metrics.clone());
        let state = AppState {
            environment: config.environment,
            metrics: metrics.clone(),
        };
        let router = pipeline.wrap(build_routes(state, permissions));

        Self {
            router,
            config,
            registry,
            metrics,
        }
    }

    /// The fully wrapped router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> &Arc<ClientLimiterRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Serve until `shutdown` fires, then drain and stop the sweep.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = self.config.environment.as_str(),
            rate_limit_enabled = self.registry.is_enabled(),
            "HTTP server starting"
        );

        self.registry.spawn_sweeper();

        let mut stop = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        self.registry.shutdown().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
