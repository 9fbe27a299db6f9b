//! Request rate limiting
//!
//! Token-bucket limiter for outbound provider requests, backed by governor's
//! direct rate limiter. Acquisition is bounded by a timeout; a denial is a
//! normal outcome and the caller skips the request.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};

/// Token-bucket limiter shared across a run's provider requests
pub struct RequestRateLimiter {
    limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RequestRateLimiter {
    /// Create a limiter allowing `requests` per minute (minimum 1)
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests.max(1)).expect("clamped to >= 1"));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Acquire a permit, waiting up to `timeout`
    ///
    /// Returns false when the timeout elapses before a permit is available.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.limiter.until_ready()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Rate limit timeout reached");
                false
            }
        }
    }

    /// Acquire a permit without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter").finish_non_exhaustive()
    }
}
