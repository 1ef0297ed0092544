use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

/// Spacing between consecutive outbound catalog calls.
pub const API_CALL_SPACING: Duration = Duration::from_millis(75);

/// Gate awaited before each outbound call that needs pacing.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pace(&self);
}

/// Minimum-interval gate: the first caller passes immediately,
/// consecutive callers wait out the interval.
pub struct ApiPacer {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ApiPacer {
    pub fn new(min_interval: Duration) -> Self {
        let quota = Quota::with_period(min_interval).expect("pacing interval is non-zero");
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl Default for ApiPacer {
    fn default() -> Self {
        Self::new(API_CALL_SPACING)
    }
}

#[async_trait]
impl Pacer for ApiPacer {
    async fn pace(&self) {
        self.limiter.until_ready().await;
    }
}
