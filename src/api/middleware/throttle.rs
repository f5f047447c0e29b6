use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use crate::api::handlers::AppState;
use crate::errors::ApiError;
use crate::metrics::registry::THROTTLED_REQUESTS_TOTAL;

/// Process-wide request throttle for the API routes
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    requests_per_second: NonZeroU32,
}

impl Throttle {
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(requests_per_second))),
            requests_per_second,
        }
    }

    /// Take one request slot, or report how long until one frees up
    pub fn check(&self) -> Result<(), ApiError> {
        self.limiter.check().map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            // Round up so clients never retry early
            let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            ApiError::Throttled {
                wait: Some(seconds.max(1)),
            }
        })
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second.get()
    }
}

/// Reject requests over the configured rate with a throttled fault
pub async fn throttle(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(throttle) = &state.throttle {
        if let Err(err) = throttle.check() {
            debug!(
                path = %request.uri().path(),
                rate = throttle.requests_per_second(),
                "Request throttled"
            );
            THROTTLED_REQUESTS_TOTAL.inc();
            return Err(err);
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_throttled() {
        let throttle = Throttle::new(NonZeroU32::new(2).unwrap());

        assert!(throttle.check().is_ok());
        assert!(throttle.check().is_ok());

        match throttle.check() {
            Err(ApiError::Throttled { wait: Some(wait) }) => assert!(wait >= 1),
            other => panic!("expected throttled fault, got {other:?}"),
        }
    }

    #[test]
    fn test_requests_per_second() {
        let throttle = Throttle::new(NonZeroU32::new(7).unwrap());
        assert_eq!(throttle.requests_per_second(), 7);
    }
}
