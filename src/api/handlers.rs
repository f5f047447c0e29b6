use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Json},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use super::middleware::{AllowedHosts, Throttle};
use crate::config::{Config, ExceptionHandlerKind};
use crate::errors::{ApiError, DefaultExceptionHandler, EnvelopeExceptionHandler, ExceptionHandler};

lazy_static::lazy_static! {
    static ref START_TIME: Instant = Instant::now();
}

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub exception_handler: Arc<dyn ExceptionHandler>,
    pub allowed_hosts: AllowedHosts,
    pub throttle: Option<Throttle>,
}

impl AppStateInner {
    pub fn from_config(config: Config) -> Self {
        // Validated to be a legal header value when the configuration was loaded
        let challenge = HeaderValue::from_str(&config.jwt.www_authenticate()).ok();
        let formatter = DefaultExceptionHandler::new(challenge);

        let exception_handler: Arc<dyn ExceptionHandler> = match config.api.exception_handler {
            ExceptionHandlerKind::Envelope => Arc::new(EnvelopeExceptionHandler::new(formatter)),
            ExceptionHandlerKind::Default => Arc::new(formatter),
        };

        Self {
            allowed_hosts: AllowedHosts::new(config.effective_allowed_hosts()),
            throttle: config
                .api
                .throttle_rate_per_second
                .and_then(NonZeroU32::new)
                .map(Throttle::new),
            exception_handler,
            config: Arc::new(config),
        }
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    Json(serde_json::json!({
        "status": "healthy",
        "service": "family-karaoke",
        "version": env!("CARGO_PKG_VERSION"),
        "instance_id": config.server.instance_id,
        "build": {
            "version": env!("CARGO_PKG_VERSION"),
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
        },
        "environment": {
            "profile": config.environment.as_str(),
            "debug": config.debug,
            "database": config.database.kind.as_str(),
            "time_zone": config.locale.time_zone,
        },
        "uptime_seconds": START_TIME.elapsed().as_secs(),
    }))
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is running", body = serde_json::Value)
    )
)]
pub async fn health_live(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "service": "family-karaoke",
        "instance_id": state.config.server.instance_id,
    }))
}

/// Readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = serde_json::Value)
    )
)]
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "service": "family-karaoke",
        "instance_id": state.config.server.instance_id,
        "throttle_rate_per_second": state.throttle.as_ref().map(Throttle::requests_per_second),
    }))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found()
}
