use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::codes::ErrorCode;

/// Fault raised while handling an API request.
///
/// Every variant except [`ApiError::Internal`] can be rendered by the default
/// exception handler. `Internal` faults fall through to the unformatted
/// failure path and are answered with a bare 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", render_payload(.0))]
    Validation(Value),

    #[error("{0}")]
    ParseError(String),

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    NotAuthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method \"{0}\" not allowed.")]
    MethodNotAllowed(Method),

    #[error("{0}")]
    NotAcceptable(String),

    #[error("Unsupported media type \"{0}\" in request.")]
    UnsupportedMediaType(String),

    #[error("{}", throttled_message(.wait))]
    Throttled { wait: Option<u64> },

    #[error("{}", render_payload(.payload))]
    Custom {
        status: StatusCode,
        code: String,
        payload: Value,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Validation fault. A plain string payload is wrapped into a one-element list.
    pub fn validation(payload: impl Into<Value>) -> Self {
        match payload.into() {
            Value::String(message) => Self::Validation(Value::Array(vec![Value::String(message)])),
            other => Self::Validation(other),
        }
    }

    /// Validation fault carrying only the generic "Invalid input." message
    pub fn invalid() -> Self {
        Self::validation(default_message(ErrorCode::Invalid))
    }

    pub fn parse_error() -> Self {
        Self::ParseError(default_message(ErrorCode::ParseError))
    }

    pub fn authentication_failed() -> Self {
        Self::AuthenticationFailed(default_message(ErrorCode::AuthenticationFailed))
    }

    pub fn not_authenticated() -> Self {
        Self::NotAuthenticated(default_message(ErrorCode::NotAuthenticated))
    }

    pub fn permission_denied() -> Self {
        Self::PermissionDenied(default_message(ErrorCode::PermissionDenied))
    }

    pub fn not_found() -> Self {
        Self::NotFound(default_message(ErrorCode::NotFound))
    }

    pub fn not_acceptable() -> Self {
        Self::NotAcceptable(default_message(ErrorCode::NotAcceptable))
    }

    /// Fault with a caller-chosen status, code and payload
    pub fn custom(status: StatusCode, code: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self::Custom {
            status,
            code: code.into(),
            payload: payload.into(),
        }
    }

    /// Machine-readable code, as reported in metrics
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(_) => ErrorCode::Invalid.as_str(),
            Self::ParseError(_) => ErrorCode::ParseError.as_str(),
            Self::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed.as_str(),
            Self::NotAuthenticated(_) => ErrorCode::NotAuthenticated.as_str(),
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied.as_str(),
            Self::NotFound(_) => ErrorCode::NotFound.as_str(),
            Self::MethodNotAllowed(_) => ErrorCode::MethodNotAllowed.as_str(),
            Self::NotAcceptable(_) => ErrorCode::NotAcceptable.as_str(),
            Self::UnsupportedMediaType(_) => ErrorCode::UnsupportedMediaType.as_str(),
            Self::Throttled { .. } => ErrorCode::Throttled.as_str(),
            Self::Custom { code, .. } => code,
            Self::Internal(_) => ErrorCode::Error.as_str(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Validation(_) => ErrorCode::Invalid,
            Self::ParseError(_) => ErrorCode::ParseError,
            Self::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed,
            Self::NotAuthenticated(_) => ErrorCode::NotAuthenticated,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::MethodNotAllowed(_) => ErrorCode::MethodNotAllowed,
            Self::NotAcceptable(_) => ErrorCode::NotAcceptable,
            Self::UnsupportedMediaType(_) => ErrorCode::UnsupportedMediaType,
            Self::Throttled { .. } => ErrorCode::Throttled,
            Self::Custom { status, .. } => return *status,
            Self::Internal(_) => ErrorCode::Error,
        };
        StatusCode::from_u16(code.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Structured payload carried by the fault, `None` for faults that cannot be formatted
    pub fn payload(&self) -> Option<Value> {
        match self {
            Self::Validation(payload) | Self::Custom { payload, .. } => Some(payload.clone()),
            Self::Internal(_) => None,
            other => Some(Value::String(other.to_string())),
        }
    }
}

fn render_payload(payload: &Value) -> String {
    match payload {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

fn default_message(code: ErrorCode) -> String {
    code.default_message().unwrap_or_default().to_string()
}

fn throttled_message(wait: &Option<u64>) -> String {
    let base = default_message(ErrorCode::Throttled);
    match wait {
        Some(1) => format!("{base} Expected available in 1 second."),
        Some(wait) => format!("{base} Expected available in {wait} seconds."),
        None => base,
    }
}

/// Fault attached to a response on its way back through the middleware stack
#[derive(Debug, Clone)]
pub struct RaisedError(Arc<ApiError>);

impl RaisedError {
    pub fn new(error: ApiError) -> Self {
        Self(Arc::new(error))
    }

    pub fn error(&self) -> &ApiError {
        &self.0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Placeholder; the exception middleware replaces it with the formatted response.
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(RaisedError::new(self));
        response
    }
}
