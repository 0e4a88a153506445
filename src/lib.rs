//! Request-security middleware pipeline for Axum services.
//!
//! Every request is fingerprinted, checked against a global circuit breaker
//! and a per-client sliding-window rate limiter, handed to the application,
//! and returned with hardening headers. CSRF tokens and sessions are
//! available to handlers through extractors.

// Core subsystems
pub mod config;
pub mod http;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ShieldConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{SecurityError, SecurityState};
