//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the built-in API routes plus consumer routes
//! - Wire up middleware (request ID, tracing, timeout, body limit, panics)
//! - Put the security pipeline in front of every route, fallback included
//! - Run the store sweeper for the lifetime of the listener
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → Trace → security_middleware
//!     → Cors → Timeout → RequestBodyLimit → CatchPanic → handler
//! ```
//! The security middleware sits outside CORS, timeout, body-limit and panic
//! handling so preflights are rate limited and the hardening headers land on
//! the responses those layers produce.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ShieldConfig;
use crate::http::cors::cors_layer;
use crate::http::handlers;
use crate::http::panic::handle_panic;
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::security::sweeper::Sweeper;
use crate::security::{security_middleware, SecurityState};

/// HTTP server fronted by the security pipeline.
pub struct HttpServer {
    router: Router,
    state: Arc<SecurityState>,
}

impl HttpServer {
    /// Server with only the built-in routes.
    pub fn new(config: ShieldConfig) -> Self {
        Self::from_state(Arc::new(SecurityState::new(config)), Router::new())
    }

    /// Server with consumer routes merged behind the pipeline.
    pub fn with_routes(config: ShieldConfig, routes: Router<Arc<SecurityState>>) -> Self {
        Self::from_state(Arc::new(SecurityState::new(config)), routes)
    }

    /// Server over prebuilt state, e.g. with a manual clock or in-memory security log.
    pub fn from_state(state: Arc<SecurityState>, routes: Router<Arc<SecurityState>>) -> Self {
        let router = Self::build_router(state.clone(), routes);
        Self { router, state }
    }

    #[allow(deprecated)]
    fn build_router(state: Arc<SecurityState>, routes: Router<Arc<SecurityState>>) -> Router {
        let config = state.config();
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let max_body_size = config.security.max_body_size;
        let cors = cors_layer(&config.cors);

        Router::new()
            .route("/api/health", get(handlers::health))
            .route("/api/csrf-token", get(handlers::issue_csrf_token))
            .route(
                "/api/session",
                get(handlers::session_status)
                    .post(handlers::create_session)
                    .delete(handlers::delete_session),
            )
            .merge(routes)
            .fallback(handlers::not_found)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(cors)
            .layer(middleware::from_fn_with_state(state.clone(), security_middleware))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .with_state(state)
    }

    /// Router for in-process use (e.g. `tower::ServiceExt::oneshot`).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &Arc<SecurityState> {
        &self.state
    }

    pub fn config(&self) -> &ShieldConfig {
        self.state.config()
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweep_interval = Duration::from_secs(self.config().session.sweep_interval_secs);
        let sweeper = Sweeper::new(self.state.clone(), sweep_interval);
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
