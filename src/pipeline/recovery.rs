//! Panic recovery.
//!
//! A panic anywhere inside the pipeline is caught per request by
//! tower-http's `CatchPanicLayer` and turned into a generic 500 with
//! `Connection: close`. Other in-flight requests run on their own tasks
//! and are not affected.
//!
//! The unwind skips the authentication layer's response path, so the
//! recovered response carries `Vary: Authorization` itself.

use std::any::Any;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::GateError;

pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

pub fn recovery_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(panic_response as PanicHandler)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = GateError::Panic(detail).into_response();
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panic_becomes_500_with_connection_close() {
        let app = Router::new()
            .route("/boom", get(explode))
            .layer(recovery_layer());

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get(header::CONNECTION).unwrap(), "close");
        assert_eq!(response.headers().get(header::VARY).unwrap(), "Authorization");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["error"],
            "the server encountered a problem and could not process your request"
        );
    }
}
