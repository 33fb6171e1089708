//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, limiter windows within one day, addresses parse)
//! - Check fixture tokens have the shape the authenticator accepts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::auth::token::is_valid_token_shape;
use crate::config::schema::GatewayConfig;
use crate::security::rate_limit::MAX_WINDOW_SECS;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if !(rl.requests_per_second.is_finite() && rl.requests_per_second > 0.0) {
            errors.push(ValidationError::new(
                "rate_limit.requests_per_second",
                "must be greater than zero",
            ));
        }
        if rl.burst == 0 {
            errors.push(ValidationError::new("rate_limit.burst", "must be greater than zero"));
        }
        for (field, secs) in [
            ("rate_limit.sweep_interval_secs", rl.sweep_interval_secs),
            ("rate_limit.idle_timeout_secs", rl.idle_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_WINDOW_SECS {
                errors.push(ValidationError::new(
                    field,
                    format!("must be between 1 and {MAX_WINDOW_SECS} seconds"),
                ));
            }
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    let mut ids = HashSet::new();
    for (i, fixture) in config.fixtures.iter().enumerate() {
        if !ids.insert(fixture.id) {
            errors.push(ValidationError::new(
                format!("fixtures[{i}].id"),
                format!("duplicate user id {}", fixture.id),
            ));
        }
        if let Some(token) = &fixture.token {
            if !is_valid_token_shape(token) {
                errors.push(ValidationError::new(
                    format!("fixtures[{i}].token"),
                    "must be 26 base32 characters",
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FixtureUser;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.rate_limit.requests_per_second = 0.0;
        config.rate_limit.burst = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "rate_limit.requests_per_second",
                "rate_limit.burst"
            ]
        );
    }

    #[test]
    fn test_limiter_windows_are_bounded() {
        let mut config = GatewayConfig::default();
        config.rate_limit.sweep_interval_secs = u64::MAX;
        config.rate_limit.idle_timeout_secs = MAX_WINDOW_SECS + 1;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["rate_limit.sweep_interval_secs", "rate_limit.idle_timeout_secs"]
        );

        config.rate_limit.sweep_interval_secs = MAX_WINDOW_SECS;
        config.rate_limit.idle_timeout_secs = MAX_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_limiter_skips_rate_checks() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.burst = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_fixture_token_shape_checked() {
        let mut config = GatewayConfig::default();
        config.fixtures.push(FixtureUser {
            id: 1,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            activated: true,
            token: Some("short".into()),
            permissions: vec![],
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "fixtures[0].token");
    }
}
