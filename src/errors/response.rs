//! Uniform `{"error", "detail"}` envelope for every formatted API fault.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::context::HandlerContext;
use super::fault::ApiError;
use super::handler::{DefaultExceptionHandler, ErrorResponse, ExceptionHandler};

/// Body of every formatted error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    /// Primary human-readable message
    pub error: String,
    /// Original structured body, `null` when it was a plain string
    pub detail: Option<Value>,
}

impl ErrorEnvelope {
    /// Build the envelope from the baseline body produced for `error`.
    pub fn from_baseline(error: &ApiError, body: Value) -> Self {
        let message = match &body {
            Value::Object(map) => map.get("detail").map(display_value),
            _ => None,
        }
        .unwrap_or_else(|| error.to_string());

        let detail = match body {
            Value::String(_) => None,
            other => Some(other),
        };

        Self {
            error: message,
            detail,
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::json!({
            "error": self.error,
            "detail": self.detail,
        })
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Format `error` with `formatter` and rewrite the body into an [`ErrorEnvelope`].
///
/// Status and headers of the baseline response are left untouched. Returns
/// `None` when the formatter has no rule for the fault.
pub fn normalize(
    error: &ApiError,
    context: &HandlerContext,
    formatter: &dyn ExceptionHandler,
) -> Option<ErrorResponse> {
    let mut response = formatter.handle(error, context)?;
    let baseline = std::mem::take(&mut response.body);
    response.body = ErrorEnvelope::from_baseline(error, baseline).into_value();
    Some(response)
}

/// Exception handler that wraps another one and normalizes its output
#[derive(Debug, Clone, Default)]
pub struct EnvelopeExceptionHandler<H = DefaultExceptionHandler> {
    inner: H,
}

impl<H: ExceptionHandler> EnvelopeExceptionHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: ExceptionHandler> ExceptionHandler for EnvelopeExceptionHandler<H> {
    fn handle(&self, error: &ApiError, context: &HandlerContext) -> Option<ErrorResponse> {
        normalize(error, context, &self.inner)
    }
}
