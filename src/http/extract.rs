//! Extractors that put CSRF and session checks in front of handlers.
//!
//! Both rely on the security middleware having attached the client
//! fingerprint to the request.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::json;

use crate::observability::metrics;
use crate::security::audit::EVENT_CSRF_VALIDATION_FAILED;
use crate::security::{
    ClientFingerprint, ClientIp, SecurityError, SecurityState, Session, SessionCheck,
};

pub const X_CSRF_TOKEN: &str = "x-csrf-token";
pub const X_SESSION_ID: &str = "x-session-id";

fn client_fingerprint(parts: &Parts) -> Result<ClientFingerprint, SecurityError> {
    parts
        .extensions
        .get::<ClientFingerprint>()
        .cloned()
        .ok_or_else(|| SecurityError::Internal("security middleware not installed".to_string()))
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Consumes a valid `X-CSRF-Token` bound to the calling client.
#[derive(Debug, Clone, Copy)]
pub struct CsrfProtected;

impl FromRequestParts<Arc<SecurityState>> for CsrfProtected {
    type Rejection = SecurityError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<SecurityState>,
    ) -> Result<Self, Self::Rejection> {
        let fingerprint = client_fingerprint(parts)?;
        let token = header(parts, X_CSRF_TOKEN);

        if token.is_some_and(|t| state.csrf().validate(t, &fingerprint)) {
            return Ok(CsrfProtected);
        }

        let client_ip = parts
            .extensions
            .get::<ClientIp>()
            .map(|ip| ip.0.as_str())
            .unwrap_or("unknown");
        metrics::record_csrf_failure();
        state.audit().log_event(
            EVENT_CSRF_VALIDATION_FAILED,
            json!({
                "fingerprint": fingerprint.as_str(),
                "path": parts.uri.path(),
                "token_present": token.is_some(),
            }),
            client_ip,
        );
        Err(SecurityError::CsrfInvalid)
    }
}

/// A live session owned by the calling client, from `X-Session-ID`.
#[derive(Debug, Clone)]
pub struct ValidSession(pub Session);

impl FromRequestParts<Arc<SecurityState>> for ValidSession {
    type Rejection = SecurityError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<SecurityState>,
    ) -> Result<Self, Self::Rejection> {
        let fingerprint = client_fingerprint(parts)?;
        let session_id = header(parts, X_SESSION_ID).ok_or(SecurityError::SessionInvalid)?;

        let check = state.sessions().check(session_id, &fingerprint);
        if check != SessionCheck::Valid {
            tracing::debug!(client = %fingerprint, outcome = ?check, "Session rejected");
            return Err(SecurityError::SessionInvalid);
        }

        state
            .sessions()
            .get(session_id)
            .map(ValidSession)
            .ok_or(SecurityError::SessionInvalid)
    }
}
