//! Configuration validation.
//!
//! Serde handles the syntax; this module checks that the values make sense
//! together. All problems are reported at once, not just the first.

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};
use thiserror::Error;

use crate::config::schema::ShieldConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("rate_limit.eviction_fraction must be in (0, 1], got {0}")]
    EvictionFraction(f64),

    #[error("{field} is not a valid socket address: {value}")]
    Address { field: &'static str, value: String },

    #[error("security.api_prefix must start with '/', got {0:?}")]
    ApiPrefix(String),

    #[error("csrf.secret must not be empty when set")]
    EmptySecret,

    #[error("cors.allowed_origins entry {0:?} must be an explicit http(s) origin")]
    CorsOrigin(String),

    #[error("cors.allowed_methods entry {0:?} is not an HTTP method")]
    CorsMethod(String),

    #[error("cors.allowed_headers entry {0:?} is not a header name")]
    CorsHeader(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let non_zero = [
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.max_requests", config.rate_limit.max_requests as u64),
        ("rate_limit.max_entries", config.rate_limit.max_entries as u64),
        ("circuit_breaker.threshold", config.circuit_breaker.threshold as u64),
        ("circuit_breaker.cooldown_secs", config.circuit_breaker.cooldown_secs),
        ("csrf.ttl_secs", config.csrf.ttl_secs),
        ("session.idle_timeout_secs", config.session.idle_timeout_secs),
        ("session.sweep_interval_secs", config.session.sweep_interval_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let fraction = config.rate_limit.eviction_fraction;
    if !(fraction > 0.0 && fraction <= 1.0) {
        errors.push(ValidationError::EvictionFraction(fraction));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if !config.security.api_prefix.starts_with('/') {
        errors.push(ValidationError::ApiPrefix(config.security.api_prefix.clone()));
    }

    if matches!(config.csrf.secret.as_deref(), Some("")) {
        errors.push(ValidationError::EmptySecret);
    }

    for origin in &config.cors.allowed_origins {
        let explicit = origin.starts_with("http://") || origin.starts_with("https://");
        if !explicit || HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }
    for method in &config.cors.allowed_methods {
        if method.parse::<Method>().is_err() {
            errors.push(ValidationError::CorsMethod(method.clone()));
        }
    }
    for name in &config.cors.allowed_headers {
        if name.parse::<HeaderName>().is_err() {
            errors.push(ValidationError::CorsHeader(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
