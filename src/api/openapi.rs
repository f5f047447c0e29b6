use utoipa::OpenApi;

use crate::errors::{ErrorCode, ErrorEnvelope};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Family Karaoke API",
        version = "0.1.0",
        description = "Backend for room reservations, waitlisting, menu management and payments. Every formatted error response uses the `ErrorEnvelope` body.",
        contact(
            name = "Family Karaoke API",
        )
    ),
    paths(
        crate::api::handlers::health,
        crate::api::handlers::health_live,
        crate::api::handlers::health_ready,
    ),
    components(
        schemas(
            ErrorEnvelope,
            ErrorCode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;
