use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use family_karaoke::api::handlers::AppStateInner;
use family_karaoke::api::routes::create_router;
use family_karaoke::config::{Config, Environment};
use family_karaoke::{metrics, telemetry};

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Starting graceful shutdown...");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    telemetry::init_subscriber();

    info!(
        "Starting Family Karaoke API v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize metrics
    metrics::registry::init_metrics();
    info!("Metrics registry initialized");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        environment = config.environment.as_str(),
        debug = config.debug,
        database = config.database.kind.as_str(),
        allowed_hosts = ?config.effective_allowed_hosts(),
        cors_origins = ?config.cors.allowed_origins,
        "Configuration loaded successfully"
    );
    info!(
        access_token_minutes = config.jwt.access_token_lifetime.as_secs() / 60,
        refresh_token_days = config.jwt.refresh_token_lifetime.as_secs() / 86_400,
        rotate_refresh_tokens = config.jwt.rotate_refresh_tokens,
        auth_cookie = %config.jwt.auth_cookie,
        "Token settings"
    );
    info!(
        name = %config.task_queue.name,
        workers = config.task_queue.workers,
        timeout_seconds = config.task_queue.timeout_seconds,
        retry_seconds = config.task_queue.retry_seconds,
        queue_limit = config.task_queue.queue_limit,
        bulk = config.task_queue.bulk,
        "Task queue settings"
    );
    if config.debug && config.environment == Environment::Production {
        warn!("DEBUG is enabled in the production profile");
    }

    let addr = config.server_address();

    // Create application state
    let state = Arc::new(AppStateInner::from_config(config));
    match &state.throttle {
        Some(throttle) => info!(
            "API throttle enabled at {} requests/second",
            throttle.requests_per_second()
        ),
        None => info!("API throttle is disabled"),
    }

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server")?;

    info!("Server listening on {}", addr);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");

    Ok(())
}
