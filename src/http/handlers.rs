//! Built-in API handlers.
//!
//! These sit behind the security middleware like any application route, so
//! they are rate limited and fingerprinted the same way.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;

use crate::http::extract::{CsrfProtected, ValidSession};
use crate::security::{ClientFingerprint, SecurityState};

pub const SERVICE_NAME: &str = "site-shield";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub session_id: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub csrf_token: String,
    pub expires_in: u64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// Issue a CSRF token bound to the caller.
pub async fn issue_csrf_token(
    State(state): State<Arc<SecurityState>>,
    Extension(fingerprint): Extension<ClientFingerprint>,
) -> Json<CsrfTokenResponse> {
    let token = state.csrf().issue(&fingerprint);
    Json(CsrfTokenResponse {
        csrf_token: token.into_string(),
        expires_in: state.csrf().ttl().as_secs(),
    })
}

pub async fn create_session(
    State(state): State<Arc<SecurityState>>,
    Extension(fingerprint): Extension<ClientFingerprint>,
) -> Json<SessionCreatedResponse> {
    let session_id = state.sessions().create(&fingerprint);
    Json(SessionCreatedResponse {
        session_id,
        expires_in: state.sessions().idle_timeout().as_secs(),
    })
}

/// Validating the session also refreshes its idle timer and, when the
/// session's CSRF token has been used or has expired, replaces it.
pub async fn session_status(
    State(state): State<Arc<SecurityState>>,
    ValidSession(session): ValidSession,
) -> Json<SessionStatusResponse> {
    Json(SessionStatusResponse {
        session_id: session.session_id,
        csrf_token: session.csrf_token.into_string(),
        expires_in: state.sessions().idle_timeout().as_secs(),
    })
}

/// The CSRF check runs first so a forged request never refreshes the session.
pub async fn delete_session(
    State(state): State<Arc<SecurityState>>,
    _csrf: CsrfProtected,
    ValidSession(session): ValidSession,
) -> StatusCode {
    state.sessions().delete(&session.session_id);
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_body() {
        let Json(body) = health().await;
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value, json!({ "status": "healthy", "service": "site-shield" }));
    }

    #[tokio::test]
    async fn test_not_found_status() {
        assert_eq!(not_found().await.status(), StatusCode::NOT_FOUND);
    }
}
