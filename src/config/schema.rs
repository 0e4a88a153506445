//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shield.
//! All types derive Serde traits for deserialization from config files, and
//! every default matches the reference deployment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the security pipeline and its HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShieldConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Global overload protection.
    pub circuit_breaker: CircuitBreakerConfig,

    /// CSRF token issuance and validation.
    pub csrf: CsrfConfig,

    /// Session store settings.
    pub session: SessionConfig,

    /// Request hardening settings.
    pub security: SecurityConfig,

    /// Cross-origin resource sharing policy.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8001".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Sliding-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Length of the trailing window in seconds.
    pub window_secs: u64,

    /// Maximum requests a single fingerprint may make per window.
    pub max_requests: usize,

    /// Maximum number of fingerprints tracked before LRU eviction kicks in.
    pub max_entries: usize,

    /// Fraction of tracked fingerprints evicted in one batch, in (0, 1].
    pub eviction_fraction: f64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Number of fingerprints dropped per eviction pass (at least one).
    pub fn eviction_batch(&self) -> usize {
        let batch = (self.max_entries as f64 * self.eviction_fraction).ceil() as usize;
        batch.clamp(1, self.max_entries.max(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 100,
            max_entries: 5000,
            eviction_fraction: 0.2,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Aggregate in-window requests above which the breaker opens.
    pub threshold: usize,

    /// Seconds the breaker stays open before closing itself.
    pub cooldown_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 1000,
            cooldown_secs: 30,
        }
    }
}

/// CSRF token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Token lifetime in seconds.
    pub ttl_secs: u64,

    /// Signing secret. A random per-process secret is generated when unset,
    /// which invalidates outstanding tokens on restart.
    pub secret: Option<String>,
}

impl CsrfConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            secret: None,
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session expires, in seconds.
    pub idle_timeout_secs: u64,

    /// Interval of the background sweep over sessions and CSRF tokens.
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
            sweep_interval_secs: 300,
        }
    }
}

/// Request hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Path prefix whose requests are always logged.
    pub api_prefix: String,

    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// CORS policy. Only listed origins get `Access-Control-Allow-Origin`;
/// credentials are never allowed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins (scheme, host, optional port). `*` is not accepted.
    pub allowed_origins: Vec<String>,

    /// Methods a cross-origin request may use.
    pub allowed_methods: Vec<String>,

    /// Request headers a cross-origin request may send.
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: [
                "http://localhost:3000",
                "http://localhost:8001",
                "http://127.0.0.1:3000",
                "http://127.0.0.1:8001",
            ]
            .map(String::from)
            .to_vec(),
            allowed_methods: ["GET", "POST", "HEAD", "OPTIONS", "DELETE"]
                .map(String::from)
                .to_vec(),
            // The CSRF and session headers are needed by the built-in API
            allowed_headers: [
                "Content-Type",
                "Authorization",
                "X-Requested-With",
                "X-CSRF-Token",
                "X-Session-ID",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = ShieldConfig::default();
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.max_entries, 5000);
        assert_eq!(config.circuit_breaker.threshold, 1000);
        assert_eq!(config.circuit_breaker.cooldown_secs, 30);
        assert_eq!(config.csrf.ttl_secs, 3600);
        assert_eq!(config.session.idle_timeout_secs, 1800);
    }

    #[test]
    fn test_cors_defaults_are_restrictive() {
        let cors = CorsConfig::default();
        assert!(!cors.allowed_origins.iter().any(|o| o == "*"));
        assert!(cors.allowed_origins.contains(&"http://localhost:3000".to_string()));
        assert!(cors.allowed_headers.contains(&"X-Requested-With".to_string()));
        assert!(!cors.allowed_methods.contains(&"PUT".to_string()));
    }

    #[test]
    fn test_eviction_batch() {
        let mut limits = RateLimitConfig::default();
        assert_eq!(limits.eviction_batch(), 1000);

        limits.max_entries = 3;
        assert_eq!(limits.eviction_batch(), 1);

        limits.eviction_fraction = 1.0;
        assert_eq!(limits.eviction_batch(), 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ShieldConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 5

            [csrf]
            secret = "s3cret"

            [cors]
            allowed_origins = ["https://app.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.csrf.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(config.cors.allowed_methods.len(), 5);
    }
}
