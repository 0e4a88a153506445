//! Security failures and their HTTP translation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::security::clock::ceil_secs;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("service temporarily unavailable")]
    Overloaded { retry_after: Duration },

    #[error("too many requests")]
    RateLimited { retry_after: Duration },

    /// Covers expired, reused, foreign and malformed tokens alike.
    #[error("CSRF token missing or invalid")]
    CsrfInvalid,

    #[error("session missing, invalid or expired")]
    SessionInvalid,

    /// Unexpected fault. The message stays server side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SecurityError {
    pub fn status(&self) -> StatusCode {
        match self {
            SecurityError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SecurityError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SecurityError::CsrfInvalid => StatusCode::FORBIDDEN,
            SecurityError::SessionInvalid => StatusCode::UNAUTHORIZED,
            SecurityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SecurityError::Overloaded { retry_after } | SecurityError::RateLimited { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        if let SecurityError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal error");
            return internal_error_response();
        }

        let status = self.status();
        let body = match self.retry_after() {
            Some(retry_after) => json!({
                "detail": self.to_string(),
                "retry_after": ceil_secs(retry_after),
            }),
            None => json!({ "detail": self.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(ceil_secs(retry_after)));
        }
        response
    }
}

/// Generic 500 body. The error id is the current Unix second: coarse, but
/// enough to find the matching server-side log line.
pub fn internal_error_response() -> Response {
    let error_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string();

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "detail": "Internal server error",
            "error_id": error_id,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let retry_after = Duration::from_secs(1);
        assert_eq!(SecurityError::Overloaded { retry_after }.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(SecurityError::RateLimited { retry_after }.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(SecurityError::CsrfInvalid.status(), StatusCode::FORBIDDEN);
        assert_eq!(SecurityError::SessionInvalid.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_retry_after_header() {
        let response = SecurityError::RateLimited {
            retry_after: Duration::from_millis(48_200),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "49");

        let response = SecurityError::CsrfInvalid.into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn test_internal_error_is_sanitized() {
        let response = SecurityError::Internal("db at /var/lib/secret failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("/var/lib/secret"));

        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "Internal server error");
        assert!(body["error_id"].as_str().unwrap().parse::<u64>().is_ok());
    }
}
