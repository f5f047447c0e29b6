use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Machine-readable codes for the faults the API knows how to format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Input validation failed
    Invalid,

    /// Request body could not be parsed
    ParseError,

    /// Credentials were supplied but rejected
    AuthenticationFailed,

    /// No credentials were supplied
    NotAuthenticated,

    /// Authenticated but not allowed
    PermissionDenied,

    /// Resource not found
    NotFound,

    /// HTTP method not supported by the route
    MethodNotAllowed,

    /// Accept header cannot be satisfied
    NotAcceptable,

    /// Content-Type of the body is not supported
    UnsupportedMediaType,

    /// Too many requests
    Throttled,

    /// Generic server-side fault
    Error,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::ParseError => "parse_error",
            Self::AuthenticationFailed => "authentication_failed",
            Self::NotAuthenticated => "not_authenticated",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::NotAcceptable => "not_acceptable",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::Throttled => "throttled",
            Self::Error => "error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Invalid => 400,
            Self::ParseError => 400,
            Self::AuthenticationFailed => 401,
            Self::NotAuthenticated => 401,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::NotAcceptable => 406,
            Self::UnsupportedMediaType => 415,
            Self::Throttled => 429,
            Self::Error => 500,
        }
    }

    /// Message used when a fault is raised without one.
    ///
    /// `None` when the message names the request (method, media type) or the
    /// fault is never formatted.
    pub fn default_message(&self) -> Option<&'static str> {
        match self {
            Self::Invalid => Some("Invalid input."),
            Self::ParseError => Some("Malformed request."),
            Self::AuthenticationFailed => Some("Incorrect authentication credentials."),
            Self::NotAuthenticated => Some("Authentication credentials were not provided."),
            Self::PermissionDenied => Some("You do not have permission to perform this action."),
            Self::NotFound => Some("Not found."),
            Self::NotAcceptable => Some("Could not satisfy the request Accept header."),
            Self::Throttled => Some("Request was throttled."),
            Self::MethodNotAllowed | Self::UnsupportedMediaType | Self::Error => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
