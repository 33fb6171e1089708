//! Pipeline error taxonomy.
//!
//! Every stage of the pipeline terminates the chain by returning a
//! [`GateError`]. The error is converted into an HTTP response exactly once,
//! in [`IntoResponse`], so the wire contract lives in one place.
//!
//! # Design Decisions
//! - 401 responses never reveal whether a header was malformed or a token
//!   unknown; both carry the same message. Logs keep the distinction.
//! - 500 responses never carry internal detail.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::store::StoreError;
use crate::observability::metrics;

const MSG_RATE_LIMITED: &str = "rate limit exceeded";
const MSG_INVALID_CREDENTIALS: &str = "invalid authentication credentials";
const MSG_INVALID_TOKEN: &str = "invalid or missing authentication token";
const MSG_AUTH_REQUIRED: &str = "you must be authenticated to access this resource";
const MSG_INACTIVE: &str = "your user account must be activated to access this resource";
const MSG_NOT_PERMITTED: &str =
    "your user account doesn't have the necessary permissions to access this resource";
const MSG_SERVER_ERROR: &str = "the server encountered a problem and could not process your request";

/// Reasons a request is rejected by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("client exceeded its request rate")]
    RateLimited,

    /// `Authorization` header present but not `Bearer <token>`.
    #[error("malformed authorization header")]
    InvalidCredentials,

    /// Token failed the shape check before any lookup.
    #[error("authentication token has an invalid shape")]
    InvalidToken,

    /// Well-shaped token with no live authentication session.
    #[error("no live session for authentication token")]
    TokenNotFound,

    #[error("anonymous caller on a protected resource")]
    AuthenticationRequired,

    #[error("user account is not activated")]
    InactiveAccount,

    #[error("missing permission {0}")]
    PermissionDenied(String),

    #[error("lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("could not determine client address: {0}")]
    ClientAddress(String),

    #[error("handler panicked: {0}")]
    Panic(String),

    /// A gate or handler ran without the authentication layer in front.
    #[error("no principal attached to request")]
    MissingPrincipal,
}

impl GateError {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::RateLimited => "rate_limited",
            GateError::InvalidCredentials => "invalid_credentials",
            GateError::InvalidToken => "invalid_token",
            GateError::TokenNotFound => "token_not_found",
            GateError::AuthenticationRequired => "authentication_required",
            GateError::InactiveAccount => "inactive_account",
            GateError::PermissionDenied(_) => "permission_denied",
            GateError::Lookup(_) => "lookup_failure",
            GateError::ClientAddress(_) => "client_address",
            GateError::Panic(_) => "panic",
            GateError::MissingPrincipal => "missing_principal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GateError::InvalidCredentials
            | GateError::InvalidToken
            | GateError::TokenNotFound
            | GateError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            GateError::InactiveAccount | GateError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            GateError::Lookup(_)
            | GateError::ClientAddress(_)
            | GateError::Panic(_)
            | GateError::MissingPrincipal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the caller.
    fn public_message(&self) -> &'static str {
        match self {
            GateError::RateLimited => MSG_RATE_LIMITED,
            GateError::InvalidCredentials | GateError::TokenNotFound => MSG_INVALID_CREDENTIALS,
            GateError::InvalidToken => MSG_INVALID_TOKEN,
            GateError::AuthenticationRequired => MSG_AUTH_REQUIRED,
            GateError::InactiveAccount => MSG_INACTIVE,
            GateError::PermissionDenied(_) => MSG_NOT_PERMITTED,
            GateError::Lookup(_)
            | GateError::ClientAddress(_)
            | GateError::Panic(_)
            | GateError::MissingPrincipal => MSG_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            GateError::RateLimited => tracing::debug!(kind = self.kind(), "Request rate limited"),
            GateError::Lookup(_)
            | GateError::ClientAddress(_)
            | GateError::Panic(_)
            | GateError::MissingPrincipal => {
                tracing::error!(kind = self.kind(), error = %self, "Request failed")
            }
            _ => tracing::info!(kind = self.kind(), error = %self, "Request rejected"),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        self.log();
        metrics::record_rejection(self.kind());

        let mut response = (
            self.status(),
            Json(ErrorBody {
                error: self.public_message(),
            }),
        )
            .into_response();

        let headers = response.headers_mut();
        if matches!(self, GateError::InvalidToken) {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if self.status().is_server_error() {
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_kinds_share_status() {
        for err in [
            GateError::InvalidCredentials,
            GateError::InvalidToken,
            GateError::TokenNotFound,
            GateError::AuthenticationRequired,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_malformed_header_and_unknown_token_look_identical() {
        assert_eq!(
            GateError::InvalidCredentials.public_message(),
            GateError::TokenNotFound.public_message()
        );
        assert_ne!(GateError::InvalidCredentials.kind(), GateError::TokenNotFound.kind());
        assert_ne!(
            GateError::InvalidToken.public_message(),
            GateError::TokenNotFound.public_message()
        );
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = GateError::ClientAddress("no connect info".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), MSG_SERVER_ERROR);

        let response = GateError::Panic("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get(header::CONNECTION).unwrap(), "close");
    }

    #[test]
    fn test_invalid_token_sets_www_authenticate() {
        let response = GateError::InvalidToken.into_response();
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = GateError::TokenNotFound.into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
