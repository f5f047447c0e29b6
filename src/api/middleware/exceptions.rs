use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::api::handlers::AppState;
use crate::errors::{ApiError, HandlerContext, RaisedError};
use crate::metrics::registry::{API_ERRORS_TOTAL, UNHANDLED_ERRORS_TOTAL};

/// Route faults raised by handlers through the installed exception handler
pub async fn handle_exceptions(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let context = HandlerContext::from_request(&request);
    let mut response = next.run(request).await;

    let raised = match response.extensions_mut().remove::<RaisedError>() {
        Some(raised) => raised,
        // The router answers unsupported methods with a bare 405
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
            RaisedError::new(ApiError::MethodNotAllowed(context.method.clone()))
        }
        None => return response,
    };

    let mut formatted = render(&state, raised.error(), &context);
    if let Some(allow) = response.headers().get(header::ALLOW) {
        formatted.headers_mut().insert(header::ALLOW, allow.clone());
    }
    formatted
}

fn render(state: &AppState, error: &ApiError, context: &HandlerContext) -> Response {
    match state.exception_handler.handle(error, context) {
        Some(formatted) => {
            debug!(
                request_id = context.request_id.as_deref().unwrap_or("-"),
                code = error.code(),
                status = formatted.status.as_u16(),
                "Formatted API error"
            );
            API_ERRORS_TOTAL
                .with_label_values(&[error.code(), formatted.status.as_str()])
                .inc();
            formatted.into_response()
        }
        None => unhandled(error, context, state.config.debug),
    }
}

/// Fallback for faults the exception handler cannot format
fn unhandled(error: &ApiError, context: &HandlerContext, debug: bool) -> Response {
    error!(
        request_id = context.request_id.as_deref().unwrap_or("-"),
        method = %context.method,
        path = %context.path,
        route = context.route.as_deref().unwrap_or("-"),
        error = %format!("{error:#}"),
        "Unhandled error while processing request"
    );
    UNHANDLED_ERRORS_TOTAL.inc();

    let body = if debug {
        format!("Server Error (500)\n\n{error:#}")
    } else {
        "Server Error (500)".to_string()
    };
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
