//! site-shield binary.
//!
//! Runs the security pipeline with its built-in API routes:
//!
//! ```text
//! Client ─▶ request id ─▶ trace ─▶ fingerprint ─▶ circuit breaker ─▶ rate limit
//!                                                                       │
//! Client ◀─ hardening headers ◀──────────────── handler (CSRF / session) ◀┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use site_shield::config::{load_config, validate_config, ConfigError, ShieldConfig};
use site_shield::lifecycle::{shutdown_signal, Shutdown};
use site_shield::observability::{logging, metrics};
use site_shield::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "site-shield", version, about = "Request-security middleware pipeline")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ShieldConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "site-shield starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        breaker_threshold = config.circuit_breaker.threshold,
        "Configuration loaded"
    );
    if config.csrf.secret.is_none() {
        tracing::warn!("No csrf.secret configured; issued tokens will not survive a restart");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
