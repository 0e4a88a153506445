//! Last-resort handling of handler panics.
//!
//! The panic message goes to the server log; the client gets the generic
//! 500 body with an error id.

use std::any::Any;

use axum::response::Response;

use crate::security::error::internal_error_response;

pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Handler panicked");
    internal_error_response()
}
