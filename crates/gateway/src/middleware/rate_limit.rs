//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use vendly_common::AppError;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Shared bucket plus the rate it was built with, for the 429 body
#[derive(Clone)]
pub struct ApiRateLimit {
    limiter: Arc<GlobalRateLimiter>,
    per_second: u32,
}

impl ApiRateLimit {
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Create a new rate limiter; zero values are raised to one
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> ApiRateLimit {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(per_second);

    ApiRateLimit {
        limiter: Arc::new(RateLimiter::direct(
            Quota::per_second(per_second).allow_burst(burst),
        )),
        per_second: per_second.get(),
    }
}

/// Reject with 429 once the bucket is empty
pub async fn rate_limit_middleware(
    State(limit): State<ApiRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if limit.check() {
        return Ok(next.run(request).await);
    }

    tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
    Err(AppError::RateLimited {
        limit: limit.per_second,
    })
}
