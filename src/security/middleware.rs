//! Security middleware pipeline.
//!
//! Per request:
//! 1. fingerprint the client
//! 2. circuit breaker check (503 + Retry-After while open)
//! 3. rate limit check (429 + Retry-After when exceeded)
//! 4. run the downstream handler
//! 5. write the hardening headers onto whatever response comes back
//! 6. log errors and API requests; static assets stay quiet

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::observability::metrics;
use crate::security::fingerprint::{self, ClientFingerprint};
use crate::security::headers;
use crate::security::state::SecurityState;

/// Peer IP of the request, attached to request extensions for handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

pub async fn security_middleware(
    State(state): State<Arc<SecurityState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let fingerprint: ClientFingerprint = fingerprint::from_headers(&client_ip, request.headers());

    let mut response = match state.admit(&fingerprint, &client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(fingerprint.clone());
            request.extensions_mut().insert(ClientIp(client_ip.clone()));
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    };

    headers::harden(response.headers_mut());

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);

    let is_error = status.is_client_error() || status.is_server_error();
    if is_error || path.starts_with(&state.config().security.api_prefix) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if status.is_server_error() {
            tracing::error!(%method, %path, status = status.as_u16(), client = %fingerprint, client_ip = %client_ip, elapsed_ms, "Request failed");
        } else if is_error {
            tracing::warn!(%method, %path, status = status.as_u16(), client = %fingerprint, client_ip = %client_ip, elapsed_ms, "Request rejected");
        } else {
            tracing::info!(%method, %path, status = status.as_u16(), client = %fingerprint, elapsed_ms, "Request served");
        }
    }

    response
}
