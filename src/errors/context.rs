use axum::{
    extract::{MatchedPath, Request},
    http::Method,
};

use crate::api::middleware::RequestId;

/// Request information handed to exception handlers alongside the fault
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    pub method: Method,
    pub path: String,
    /// Route template that matched, e.g. `/api/rooms/:id`
    pub route: Option<String>,
    pub request_id: Option<String>,
}

impl HandlerContext {
    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            route: request
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str().to_string()),
            request_id: request
                .extensions()
                .get::<RequestId>()
                .map(|id| id.as_str().to_string()),
        }
    }
}
