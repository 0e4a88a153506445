//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → fingerprint.rs (derive the client bucketing key)
//!     → guard.rs (circuit breaker, then per-fingerprint rate limit, one lock)
//!     → downstream handler (may use csrf.rs / session.rs via extractors)
//!     → headers.rs (hardening headers on every response)
//! ```
//!
//! # Design Decisions
//! - All state lives in one injectable `SecurityState`, nothing in statics
//! - Fail closed: reject on any security check failure
//! - Rejections never tell the client which check failed beyond the status
//! - Single-process, in-memory state; a restart clears everything

pub mod audit;
pub mod clock;
pub mod csrf;
pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod headers;
pub mod middleware;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod sweeper;

pub use audit::{MemorySecurityLog, SecurityLog, TracingSecurityLog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use csrf::{CsrfService, CsrfToken};
pub use error::SecurityError;
pub use fingerprint::{fingerprint, ClientFingerprint};
pub use middleware::{security_middleware, ClientIp};
pub use session::{Session, SessionCheck, SessionService};
pub use state::SecurityState;
