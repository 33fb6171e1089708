//! Layered authorization.
//!
//! # Stages
//! ```text
//! Authenticated → Activated → Permission(code)
//! ```
//! A [`Requirement`] expands into the ordered list of stages it implies and
//! [`AccessGate`] runs them in order, stopping at the first rejection.
//!
//! # Design Decisions
//! - Each stage is a pure decision over the principal; only the permission
//!   stage consults a store, and only after the earlier stages passed
//! - Stages never mutate the principal
//! - The gate is a tower layer so it can be attached per route with
//!   `Router::route_layer`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::auth::principal::{PermissionCode, Permissions, Principal, User};
use crate::auth::store::PermissionStore;
use crate::error::GateError;

/// What a route demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Activated,
    Permission(PermissionCode),
}

impl Requirement {
    pub fn permission(code: impl Into<String>) -> Self {
        Requirement::Permission(PermissionCode::new(code))
    }

    /// The ordered stages this requirement implies.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            Requirement::Authenticated => vec![Stage::Authenticated],
            Requirement::Activated => vec![Stage::Authenticated, Stage::Activated],
            Requirement::Permission(code) => vec![
                Stage::Authenticated,
                Stage::Activated,
                Stage::Permission(code.clone()),
            ],
        }
    }
}

/// One check in the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Authenticated,
    Activated,
    Permission(PermissionCode),
}

pub fn require_authenticated(principal: &Principal) -> Result<&User, GateError> {
    principal.user().ok_or(GateError::AuthenticationRequired)
}

pub fn require_activated(principal: &Principal) -> Result<&User, GateError> {
    let user = require_authenticated(principal)?;
    if user.activated {
        Ok(user)
    } else {
        Err(GateError::InactiveAccount)
    }
}

pub fn require_permission(permissions: &Permissions, code: &PermissionCode) -> Result<(), GateError> {
    if permissions.includes(code) {
        Ok(())
    } else {
        Err(GateError::PermissionDenied(code.to_string()))
    }
}

/// Runs the stages of one requirement against a request's principal.
#[derive(Clone)]
pub struct AccessGate(Arc<AccessGateInner>);

struct AccessGateInner {
    stages: Vec<Stage>,
    permissions: Arc<dyn PermissionStore>,
}

impl AccessGate {
    pub fn new(requirement: Requirement, permissions: Arc<dyn PermissionStore>) -> Self {
        Self(Arc::new(AccessGateInner {
            stages: requirement.stages(),
            permissions,
        }))
    }

    /// Run every stage in order; the first rejection wins.
    pub async fn check(&self, principal: &Principal) -> Result<(), GateError> {
        for stage in &self.0.stages {
            match stage {
                Stage::Authenticated => {
                    require_authenticated(principal)?;
                }
                Stage::Activated => {
                    require_activated(principal)?;
                }
                Stage::Permission(code) => {
                    let user = require_authenticated(principal)?;
                    let permissions = self
                        .0
                        .permissions
                        .permissions_for_user(user.id)
                        .await
                        .map_err(GateError::Lookup)?;
                    require_permission(&permissions, code)?;
                }
            }
        }
        Ok(())
    }
}

impl<S> Layer<S> for AccessGate {
    type Service = AccessGateService<S>;

    fn layer(&self, next: S) -> Self::Service {
        AccessGateService {
            next,
            gate: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AccessGateService<S> {
    next: S,
    gate: AccessGate,
}

impl<S> Service<Request<Body>> for AccessGateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.next.clone();
        let mut next = std::mem::replace(&mut self.next, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            let Some(principal) = req.extensions().get::<Principal>().cloned() else {
                return Ok(GateError::MissingPrincipal.into_response());
            };

            match gate.check(&principal).await {
                Ok(()) => next.call(req).await,
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::InMemoryStore;
    use crate::auth::store::StoreError;
    use crate::auth::principal::UserId;
    use async_trait::async_trait;

    fn user(activated: bool) -> Principal {
        Principal::from(User {
            id: 1,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            activated,
        })
    }

    struct BrokenStore;

    #[async_trait]
    impl PermissionStore for BrokenStore {
        async fn permissions_for_user(&self, _user_id: UserId) -> Result<Permissions, StoreError> {
            Err(StoreError::Backend("timeout".into()))
        }
    }

    #[test]
    fn test_requirements_expand_in_order() {
        assert_eq!(Requirement::Authenticated.stages(), vec![Stage::Authenticated]);
        assert_eq!(
            Requirement::permission("movies:write").stages(),
            vec![
                Stage::Authenticated,
                Stage::Activated,
                Stage::Permission("movies:write".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_anonymous_needs_authentication() {
        let gate = AccessGate::new(Requirement::permission("x"), Arc::new(InMemoryStore::new()));
        let err = gate.check(&Principal::Anonymous).await.unwrap_err();
        assert!(matches!(err, GateError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn test_inactive_user_rejected_before_permission_lookup() {
        let gate = AccessGate::new(Requirement::permission("x"), Arc::new(BrokenStore));
        let err = gate.check(&user(false)).await.unwrap_err();
        assert!(matches!(err, GateError::InactiveAccount));
    }

    #[tokio::test]
    async fn test_authenticated_only_allows_inactive_user() {
        let gate = AccessGate::new(Requirement::Authenticated, Arc::new(BrokenStore));
        assert!(gate.check(&user(false)).await.is_ok());
    }

    #[tokio::test]
    async fn test_granting_permission_flips_outcome() {
        let store = Arc::new(InMemoryStore::new());
        let gate = AccessGate::new(Requirement::permission("X"), store.clone());
        let principal = user(true);

        let err = gate.check(&principal).await.unwrap_err();
        assert!(matches!(err, GateError::PermissionDenied(_)));
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);

        store.grant(1, "X".into());
        assert!(gate.check(&principal).await.is_ok());
    }

    #[tokio::test]
    async fn test_permission_lookup_failure_is_internal() {
        let gate = AccessGate::new(Requirement::permission("x"), Arc::new(BrokenStore));
        let err = gate.check(&user(true)).await.unwrap_err();
        assert!(matches!(err, GateError::Lookup(_)));
    }
}
