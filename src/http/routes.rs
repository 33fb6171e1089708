//! Reference routes served behind the pipeline.
//!
//! - `GET /v1/healthcheck`: public
//! - `GET /v1/whoami`: activated users
//! - `GET /debug/vars`: users holding `metrics:read`

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::auth::{AccessGate, PermissionStore, Principal, Requirement};
use crate::config::Environment;
use crate::error::GateError;
use crate::observability::metrics::{MetricsSnapshot, PipelineMetrics};

pub const METRICS_READ: &str = "metrics:read";

#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub metrics: Arc<PipelineMetrics>,
}

pub fn build_routes(state: AppState, permissions: Arc<dyn PermissionStore>) -> Router {
    let activated = Router::new()
        .route("/v1/whoami", get(whoami))
        .route_layer(AccessGate::new(Requirement::Activated, permissions.clone()));

    let operators = Router::new()
        .route("/debug/vars", get(debug_vars))
        .route_layer(AccessGate::new(Requirement::permission(METRICS_READ), permissions));

    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .merge(activated)
        .merge(operators)
        .with_state(state)
}

async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.environment.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

async fn whoami(principal: Principal) -> Result<Json<Value>, GateError> {
    let user = principal.user().ok_or(GateError::AuthenticationRequired)?;
    Ok(Json(json!({ "user": user })))
}

async fn debug_vars(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
