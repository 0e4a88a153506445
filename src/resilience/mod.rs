//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (under the traffic guard lock):
//!     → circuit_breaker.rs (fail fast while open)
//!     → per-client rate limiting
//!     → circuit_breaker.rs (observe aggregate load, open on overload)
//! ```
//!
//! # Design Decisions
//! - Overload protection is global and coarse on purpose
//! - The breaker heals itself after its cooldown

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerPoll, BreakerState, CircuitBreaker};
