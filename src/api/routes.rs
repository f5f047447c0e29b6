use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{health, health_live, health_ready, not_found, AppState};
use super::middleware::{
    handle_exceptions, logging_middleware, security_headers, throttle, validate_host,
};
use super::openapi::ApiDoc;
use crate::config::CorsConfig;
use crate::metrics;

pub fn create_router(state: AppState) -> Router {
    create_router_with(state, Router::new())
}

/// Build the service router around the business `apps`, which declare their
/// own `/api/...` paths and are subject to throttling.
pub fn create_router_with(state: AppState, apps: Router<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);
    let static_files = &state.config.static_files;

    let apps = apps.layer(middleware::from_fn_with_state(state.clone(), throttle));

    Router::new()
        // Health check
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        // Metrics endpoint (Prometheus)
        .route("/metrics", get(metrics::metrics_handler))
        .merge(apps)
        .nest_service(static_files.mount_path(), ServeDir::new(&static_files.root))
        // OpenAPI documentation
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        // Add middleware (order matters: innermost first)
        .layer(middleware::from_fn_with_state(state.clone(), handle_exceptions))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics::middleware::track_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), validate_host))
        .layer(cors)
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if config.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allow_credentials(config.allow_credentials)
}
