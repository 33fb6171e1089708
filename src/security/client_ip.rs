//! Client identification for rate limiting.
//!
//! The peer address from the connection is authoritative. Proxy headers are
//! only read when the deployment says a trusted proxy sets them.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;

use crate::config::ClientIpConfig;
use crate::error::GateError;

/// Key under which a client's rate-limit state is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl From<&str> for ClientKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the client key for a request.
///
/// Fails when neither a trusted header nor the connection info yields an
/// address, which means the server was wired without `ConnectInfo`.
pub fn client_key<B>(config: &ClientIpConfig, req: &Request<B>) -> Result<ClientKey, GateError> {
    if config.x_real_ip {
        if let Some(ip) = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip.into());
        }
    }

    if let Some(hops) = config.x_forwarded_for_trusted_hops {
        if let Some(ip) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').rev().nth(hops))
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip.into());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().into())
        .ok_or_else(|| GateError::ClientAddress("connection info missing from request".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(peer: &str) -> Request<Body> {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_peer_address_used_by_default() {
        let mut req = request_from("10.0.0.1:5555");
        req.headers_mut().insert("x-real-ip", "1.2.3.4".parse().unwrap());

        let key = client_key(&ClientIpConfig::default(), &req).unwrap();
        assert_eq!(key.as_str(), "10.0.0.1");
    }

    #[test]
    fn test_trusted_real_ip_header() {
        let mut req = request_from("10.0.0.1:5555");
        req.headers_mut().insert("x-real-ip", "1.2.3.4".parse().unwrap());

        let config = ClientIpConfig {
            x_real_ip: true,
            x_forwarded_for_trusted_hops: None,
        };
        assert_eq!(client_key(&config, &req).unwrap().as_str(), "1.2.3.4");
    }

    #[test]
    fn test_forwarded_for_skips_trusted_hops() {
        let mut req = request_from("10.0.0.1:5555");
        req.headers_mut().insert(
            "x-forwarded-for",
            "203.0.113.9, 198.51.100.2, 10.0.0.254".parse().unwrap(),
        );

        let config = ClientIpConfig {
            x_real_ip: false,
            x_forwarded_for_trusted_hops: Some(1),
        };
        assert_eq!(client_key(&config, &req).unwrap().as_str(), "198.51.100.2");
    }

    #[test]
    fn test_garbage_header_falls_back_to_peer() {
        let mut req = request_from("10.0.0.1:5555");
        req.headers_mut().insert("x-real-ip", "not-an-ip".parse().unwrap());

        let config = ClientIpConfig {
            x_real_ip: true,
            x_forwarded_for_trusted_hops: None,
        };
        assert_eq!(client_key(&config, &req).unwrap().as_str(), "10.0.0.1");
    }

    #[test]
    fn test_missing_connect_info_is_internal_error() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = client_key(&ClientIpConfig::default(), &req).unwrap_err();
        assert!(matches!(err, GateError::ClientAddress(_)));
    }
}
