pub mod exceptions;
pub mod hosts;
pub mod logging;
pub mod security;
pub mod throttle;

pub use exceptions::handle_exceptions;
pub use hosts::{validate_host, AllowedHosts};
pub use logging::{logging_middleware, RequestId, X_REQUEST_ID};
pub use security::security_headers;
pub use throttle::{throttle, Throttle};
