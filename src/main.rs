//! Schema Evolution Analyzer
//!
//! Compares two versions of a relational schema, classifies the impact of each
//! change, checks SQL queries against the new schema and suggests migration
//! steps. Reports are stored per session and served back over HTTP.
//!
//! `schema-evolution-analyzer hash-password <password>` prints a bcrypt hash for
//! the `security.api_password_hash` setting and exits.

mod analysis;
mod auth;
mod config;
mod error;
mod routes;
mod state;
mod storage;
mod telemetry;

use crate::config::{LoggingConfig, Settings, DEFAULT_JWT_SECRET};
use crate::routes::create_router;
use crate::state::AppState;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("hash-password") {
        let password = args
            .get(2)
            .context("usage: schema-evolution-analyzer hash-password <password>")?;
        println!("{}", auth::hash_password(password)?);
        return Ok(());
    }

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;

    // Initialize tracing subscriber for structured logging
    init_tracing(&settings.logging);

    info!("🚀 Starting Schema Evolution Analyzer...");
    info!(storage = ?settings.storage.kind, "📋 Configuration loaded successfully");

    if settings.security.jwt_secret == DEFAULT_JWT_SECRET {
        warn!("⚠️  JWT secret not set, using default (INSECURE - set in production!)");
    }
    if settings.security.api_password_hash.is_none() {
        warn!("⚠️  security.api_password_hash not set, token issuance is disabled");
    }

    let metrics = telemetry::init_metrics();

    let storage = match storage::create_storage(&settings.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("❌ FATAL: Failed to initialize result storage: {}", e);
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(settings.clone(), storage, metrics));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   GET  /health                 - Liveness check");
    info!("   GET  /metrics                - Prometheus metrics");
    info!("   POST /token                  - Exchange credentials for a bearer token");
    info!("   POST /analyze                - Analyze a schema change");
    info!("   GET  /results/{{session_id}}   - Fetch a stored report");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", logging.level)));

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
