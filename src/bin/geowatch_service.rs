//! Geowatch Control Service Binary
//!
//! Runs the control API with production-grade features:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Background change-detection and status-sweep loops
//! - Health check endpoints
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `PORT`: Service port (default: 8080)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//! - `GEOWATCH_PRESERVE_CONNECTIONS`: if unset/false, every dataset is
//!   deactivated on boot in addition to having its monitoring state cleared
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run --bin geowatch_service --features service
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use geowatch_core::service::{create_router, ServiceState};
use geowatch_core::source::ExternalSourceReader;
use geowatch_core::store::PostgresStore;
use geowatch_core::AppConfig;

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "geowatch_service=info,tower_http=info,sqlx=warn".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds a correlation id and timing.
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let trace_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "geowatch_service::access",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    init_tracing(&config.log_format);

    let version = env!("CARGO_PKG_VERSION");
    info!(version = version, "Starting geowatch control service");

    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    info!("Connecting to PostgreSQL...");
    let connect_start = Instant::now();
    let store = match tokio::time::timeout(std::time::Duration::from_secs(30), PostgresStore::from_env()).await {
        Ok(Ok(store)) => store,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to connect to PostgreSQL");
            return Err(e.into());
        }
        Err(_) => {
            tracing::error!("PostgreSQL connection timeout after 30s");
            return Err("database connection timeout".into());
        }
    };
    info!(latency_ms = connect_start.elapsed().as_millis() as u64, "PostgreSQL connection established");

    store.bootstrap().await?;
    info!("schema bootstrap complete");

    let state = ServiceState::new(store, ExternalSourceReader, config.clone());

    if config.preserve_connections_on_restart {
        let report = state.lifecycle.smart_restart().await?;
        info!(datasets_touched = report.datasets_touched, "smart restart: monitoring state cleared, registrations kept");
    } else {
        let report = state.lifecycle.full_reset().await?;
        info!(
            datasets_touched = report.datasets_touched,
            datasets_deactivated = report.datasets_deactivated,
            "full reset: every dataset deactivated"
        );
    }

    let scheduler = state.scheduler.clone();
    let shutdown_scheduler = scheduler.clone();
    let background = tokio::spawn(async move {
        let mut tick = tokio::time::interval(scheduler.tick_interval());
        loop {
            tick.tick().await;
            if let Err(e) = scheduler.run_change_detection_tick().await {
                tracing::error!(error = %e, "change-detection tick failed");
            }
            scheduler.sweep_status();
        }
    });

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(address = %addr, version = version, "geowatch control service listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("received SIGTERM, initiating graceful shutdown"),
        }
    };

    info!("ready to accept connections");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    shutdown_scheduler.request_shutdown();
    background.abort();
    info!("geowatch control service shutdown complete");

    Ok(())
}
