//! Rate limiting for the credentials sign-in endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::debug;

use crate::auth::{ClientIpHeader, extract_client_ip};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// One attempt per second, bursts of five.
const SIGN_IN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const SIGN_IN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Interval between pruning idle clients from the limiter.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for credentials sign-in
    pub sign_in: Arc<IpLimiter>,
    /// Where to read the client IP from
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    pub fn new(ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            sign_in: Arc::new(RateLimiter::keyed(
                Quota::per_second(SIGN_IN_PER_SEC).allow_burst(SIGN_IN_BURST),
            )),
            ip_header,
        }
    }

    /// Forget clients whose bucket has refilled. Returns how many remain.
    pub fn prune(&self) -> usize {
        self.sign_in.retain_recent();
        self.sign_in.shrink_to_fit();
        self.sign_in.len()
    }
}

/// Spawn a background task that prunes the limiter periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(config: Arc<RateLimitConfig>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            let remaining = config.prune();
            debug!(remaining, "Pruned sign-in rate limiter");
        }
    })
}

/// Middleware for rate limiting credentials sign-in.
pub async fn rate_limit_sign_in(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header) {
        Ok(ip) => ip,
        Err(_) => {
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.sign_in.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many sign-in attempts. Please wait before trying again.",
        )
            .into_response(),
    }
}
