//! Fault model and error response formatting for the API

pub mod codes;
pub mod context;
pub mod fault;
pub mod handler;
pub mod response;

pub use codes::ErrorCode;
pub use context::HandlerContext;
pub use fault::{ApiError, RaisedError};
pub use handler::{DefaultExceptionHandler, ErrorResponse, ExceptionHandler};
pub use response::{normalize, EnvelopeExceptionHandler, ErrorEnvelope};
