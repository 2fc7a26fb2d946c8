//! gumbo-server — food ordering backend
//!
//! Long-running service that:
//! - Accepts order requests over HTTP and parks them in a durable queue
//! - Realizes queued orders asynchronously through a worker loop
//! - Refreshes the valid-coupon snapshot from external compressed sources
//! - Rate-limits all public endpoints through a shared Redis token bucket

mod api;
mod auth;
mod config;
mod coupons;
mod db;
mod error;
mod limiter;
mod state;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;

use config::Config;
use coupons::CouponRefresher;
use state::AppState;
use worker::{OrderWorker, PgCatalog};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gumbo_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    tracing::info!("Starting gumbo-server");

    // Initialize application state (PostgreSQL + migrations, Redis)
    let state = AppState::new(&config).await?;

    let shutdown = CancellationToken::new();

    // Coupon refresher: one eager run, then every 24 hours
    let refresher = CouponRefresher::new(config.coupon_base_url.clone(), state.coupons.clone())?;
    let refresher_handle = tokio::spawn(refresher.run(shutdown.clone()));

    // Queue worker
    let order_worker = OrderWorker::new(
        state.pool.clone(),
        Arc::new(PgCatalog::new(state.pool.clone())),
        Arc::new(state.coupons.clone()),
        Duration::from_secs(config.worker_interval_secs),
        config.worker_batch_size,
    );
    let worker_handle = tokio::spawn(order_worker.run(shutdown.clone()));

    // HTTP server
    let app = api::create_router(state.clone());
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("gumbo-server listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop accepting traffic first, then drain the background loops
    tracing::info!("HTTP server stopped, shutting down background tasks");
    shutdown.cancel();

    let drain = async {
        let _ = worker_handle.await;
        let _ = refresher_handle.await;
    };
    if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
        tracing::warn!("Background tasks did not stop within 30s");
    }

    state.pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        tracing::info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
