//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (request ID)
//!     → security middleware (fingerprint, breaker, rate limit, headers)
//!     → cors.rs (origin allow-list, preflight answers)
//!     → extract.rs (CSRF / session checks where a handler asks for them)
//!     → handlers.rs or consumer routes
//!     → panic.rs (sanitized 500 if a handler panics)
//! ```

pub mod cors;
pub mod extract;
pub mod handlers;
pub mod panic;
pub mod request;
pub mod server;

pub use extract::{CsrfProtected, ValidSession, X_CSRF_TOKEN, X_SESSION_ID};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
