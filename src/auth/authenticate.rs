//! Bearer token authentication.
//!
//! Resolves the `Authorization` header to a [`Principal`] and attaches it to
//! the request. A missing header is not an error: the caller is anonymous
//! and the access gate decides later whether that is acceptable.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::principal::Principal;
use crate::auth::store::{StoreError, UserStore};
use crate::auth::token::{is_valid_token_shape, Scope};
use crate::error::GateError;

/// Resolves credentials through a [`UserStore`].
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Run the credential state machine over the `Authorization` value.
    pub async fn resolve(&self, authorization: Option<&HeaderValue>) -> Result<Principal, GateError> {
        let Some(value) = authorization else {
            return Ok(Principal::Anonymous);
        };
        let value = value.to_str().map_err(|_| GateError::InvalidCredentials)?;
        if value.is_empty() {
            return Ok(Principal::Anonymous);
        }

        let token = match value.split(' ').collect::<Vec<_>>().as_slice() {
            ["Bearer", token] => *token,
            _ => return Err(GateError::InvalidCredentials),
        };

        if !is_valid_token_shape(token) {
            return Err(GateError::InvalidToken);
        }

        match self.users.find_user_by_token(Scope::Authentication, token).await {
            Ok(user) => {
                tracing::debug!(user_id = user.id, "Request authenticated");
                Ok(user.into())
            }
            Err(StoreError::NotFound) => Err(GateError::TokenNotFound),
            Err(e) => Err(GateError::Lookup(e)),
        }
    }
}

/// Attach the caller's principal, or reject a bad credential.
///
/// Every response leaving this layer varies on `Authorization`.
pub async fn authenticate_middleware(
    State(auth): State<Authenticator>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request.headers().get(header::AUTHORIZATION).cloned();
    let resolved = auth.resolve(authorization.as_ref()).await;

    let mut response = match resolved {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
