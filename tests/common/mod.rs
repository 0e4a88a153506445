//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use site_shield::config::ShieldConfig;
use site_shield::http::HttpServer;
use site_shield::lifecycle::Shutdown;
use site_shield::security::headers::HARDENING_HEADERS;
use site_shield::security::{ManualClock, MemorySecurityLog, SecurityState};

/// Simulated start time for the manual clock.
pub const START: Duration = Duration::from_secs(1_700_000_000);

/// In-process app on a manual clock with an in-memory security log.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<SecurityState>,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemorySecurityLog>,
}

impl TestApp {
    pub fn new(config: ShieldConfig) -> Self {
        Self::with_routes(config, Router::new())
    }

    pub fn with_routes(config: ShieldConfig, routes: Router<Arc<SecurityState>>) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let audit = Arc::new(MemorySecurityLog::new());
        let state = Arc::new(SecurityState::with_parts(
            config,
            clock.clone(),
            audit.clone(),
        ));
        let server = HttpServer::from_state(state.clone(), routes);

        Self {
            router: server.router(),
            state,
            clock,
            audit,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// GET as the client identified by `agent`.
    pub async fn get(&self, uri: &str, agent: &str) -> Response {
        self.send(request(Method::GET, uri, agent).body(Body::empty()).unwrap())
            .await
    }
}

/// Request builder for one simulated client. Without a peer address the
/// fingerprint varies with the user agent only.
pub fn request(method: Method, uri: &str, agent: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, agent)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn assert_hardened(response: &Response) {
    for (name, value) in HARDENING_HEADERS.iter() {
        let actual = response
            .headers()
            .get(*name)
            .unwrap_or_else(|| panic!("missing header {name}"));
        assert_eq!(actual.to_str().unwrap(), *value, "header {name}");
    }
}

/// Run a real server on an ephemeral port.
pub async fn spawn_server(
    config: ShieldConfig,
    routes: Router<Arc<SecurityState>>,
) -> (SocketAddr, Shutdown, JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::with_routes(config, routes);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    (addr, shutdown, handle)
}
