use axum::{
    http::{
        header::{RETRY_AFTER, WWW_AUTHENTICATE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::context::HandlerContext;
use super::fault::ApiError;

/// Formatted error response before it is written to the client
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Json(self.body)).into_response()
    }
}

/// Turns a fault into a response.
///
/// Returning `None` means the handler has no formatting rule for the fault;
/// the caller then falls back to the unformatted failure path.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, error: &ApiError, context: &HandlerContext) -> Option<ErrorResponse>;
}

impl<F> ExceptionHandler for F
where
    F: Fn(&ApiError, &HandlerContext) -> Option<ErrorResponse> + Send + Sync,
{
    fn handle(&self, error: &ApiError, context: &HandlerContext) -> Option<ErrorResponse> {
        self(error, context)
    }
}

/// Baseline formatter for every fault kind the API knows about.
///
/// List and mapping payloads become the body verbatim, anything else is
/// wrapped as `{"detail": ...}`.
#[derive(Debug, Clone, Default)]
pub struct DefaultExceptionHandler {
    www_authenticate: Option<HeaderValue>,
}

impl DefaultExceptionHandler {
    /// `www_authenticate` is the challenge sent with 401 responses. Without
    /// one, 401 faults are reported as 403.
    pub fn new(www_authenticate: Option<HeaderValue>) -> Self {
        Self { www_authenticate }
    }
}

impl ExceptionHandler for DefaultExceptionHandler {
    fn handle(&self, error: &ApiError, _context: &HandlerContext) -> Option<ErrorResponse> {
        let payload = error.payload()?;

        let mut status = error.status_code();
        let mut headers = HeaderMap::new();

        if status == StatusCode::UNAUTHORIZED {
            match &self.www_authenticate {
                Some(challenge) => {
                    headers.insert(WWW_AUTHENTICATE, challenge.clone());
                }
                None => status = StatusCode::FORBIDDEN,
            }
        }

        if let ApiError::Throttled { wait: Some(wait) } = error {
            headers.insert(RETRY_AFTER, HeaderValue::from(*wait));
        }

        let body = match payload {
            Value::Array(_) | Value::Object(_) => payload,
            other => json!({ "detail": other }),
        };

        Some(ErrorResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn bearer() -> DefaultExceptionHandler {
        DefaultExceptionHandler::new(Some(HeaderValue::from_static("Bearer realm=\"api\"")))
    }

    #[test]
    fn test_message_faults_are_wrapped_in_detail() {
        let response = bearer()
            .handle(&ApiError::not_found(), &HandlerContext::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, json!({"detail": "Not found."}));
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_structured_payload_is_kept_verbatim() {
        let payload = json!({"name": ["This field is required."]});
        let response = bearer()
            .handle(&ApiError::validation(payload.clone()), &HandlerContext::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, payload);
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = bearer()
            .handle(&ApiError::not_authenticated(), &HandlerContext::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers.get(WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"api\""
        );
    }

    #[test]
    fn test_unauthorized_without_scheme_becomes_forbidden() {
        let response = DefaultExceptionHandler::default()
            .handle(&ApiError::authentication_failed(), &HandlerContext::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(response.headers.get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_throttled_sets_retry_after() {
        let response = bearer()
            .handle(&ApiError::Throttled { wait: Some(3) }, &HandlerContext::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers.get(RETRY_AFTER).unwrap(), "3");
        assert_eq!(
            response.body,
            json!({"detail": "Request was throttled. Expected available in 3 seconds."})
        );
    }

    #[test]
    fn test_method_not_allowed_names_method() {
        let response = bearer()
            .handle(&ApiError::MethodNotAllowed(Method::PUT), &HandlerContext::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.body, json!({"detail": "Method \"PUT\" not allowed."}));
    }

    #[test]
    fn test_internal_fault_is_not_formatted() {
        let error = ApiError::from(anyhow::anyhow!("disk full"));
        assert!(bearer().handle(&error, &HandlerContext::default()).is_none());
    }

    #[test]
    fn test_closures_are_handlers() {
        let handler = |_: &ApiError, _: &HandlerContext| -> Option<ErrorResponse> { None };
        assert!(handler.handle(&ApiError::not_found(), &HandlerContext::default()).is_none());
    }
}
