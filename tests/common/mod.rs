//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use api_gatekeeper::auth::InMemoryStore;
use api_gatekeeper::config::{FixtureUser, GatewayConfig};
use api_gatekeeper::HttpServer;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, Response};
use serde_json::Value;

/// Activated, holds `metrics:read`.
pub const ALICE_TOKEN: &str = "ALICEALICEALICEALICEALICE2";
/// Not activated.
pub const BOB_TOKEN: &str = "BOBBOBBOBBOBBOBBOBBOBBOB22";
/// Activated, no permissions.
pub const CAROL_TOKEN: &str = "CAROLCAROLCAROLCAROLCAROL3";

pub const CAROL_ID: i64 = 3;

fn fixture(id: i64, name: &str, activated: bool, token: &str, permissions: &[&str]) -> FixtureUser {
    FixtureUser {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        activated,
        token: Some(token.to_string()),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn fixtures() -> Vec<FixtureUser> {
    vec![
        fixture(1, "Alice", true, ALICE_TOKEN, &["metrics:read"]),
        fixture(2, "Bob", false, BOB_TOKEN, &[]),
        fixture(CAROL_ID, "Carol", true, CAROL_TOKEN, &[]),
    ]
}

/// Default config with the limiter at 2 req/s, burst 4.
pub fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.fixtures = fixtures();
    config
}

pub fn server(config: GatewayConfig) -> (HttpServer, InMemoryStore) {
    let store = InMemoryStore::from_fixtures(&config.fixtures);
    let shared = Arc::new(store.clone());
    (HttpServer::new(config, shared.clone(), shared), store)
}

/// GET request as if it arrived from `ip` over a real connection.
pub fn get(uri: &str, ip: &str) -> Request<Body> {
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let addr: SocketAddr = format!("{ip}:40000").parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub fn get_with_token(uri: &str, ip: &str, token: &str) -> Request<Body> {
    let mut req = get(uri, ip);
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    req
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
