// Library exports for the server binary and tests
pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod telemetry;
