use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Error Metrics
    pub static ref API_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "api_errors_total",
        "Total API faults rendered by the exception handler",
        &["code", "status"]
    )
    .unwrap();

    pub static ref UNHANDLED_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "unhandled_errors_total",
        "Total faults the exception handler could not format"
    )
    .unwrap();

    // Request Guard Metrics
    pub static ref THROTTLED_REQUESTS_TOTAL: IntCounter = register_int_counter!(
        "throttled_requests_total",
        "Total requests rejected by the API throttle"
    )
    .unwrap();

    pub static ref DISALLOWED_HOSTS_TOTAL: IntCounter = register_int_counter!(
        "disallowed_hosts_total",
        "Total requests rejected for an invalid Host header"
    )
    .unwrap();
}

/// Initialize all metrics (called on startup)
pub fn init_metrics() {
    // Force lazy_static initialization
    lazy_static::initialize(&HTTP_REQUESTS_TOTAL);
    lazy_static::initialize(&HTTP_REQUEST_DURATION_SECONDS);
    lazy_static::initialize(&API_ERRORS_TOTAL);
    lazy_static::initialize(&UNHANDLED_ERRORS_TOTAL);
    lazy_static::initialize(&THROTTLED_REQUESTS_TOTAL);
    lazy_static::initialize(&DISALLOWED_HOSTS_TOTAL);
}
