//! Minimum spacing between destination-mutating calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between successive destination create calls.
///
/// The baseline is taken at construction (orchestration start) and moved
/// forward by [`mark`](Self::mark) after every attempt, successful or not.
/// The limiter never fails; a missed wait is only a missed optimization.
/// Share one instance between workers to keep the spacing global.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(Instant::now()),
        }
    }

    /// Wait until at least `min_interval` has passed since the last mark.
    pub async fn acquire(&self) {
        let wait = {
            let last = self.last_call.lock().await;
            self.min_interval.saturating_sub(last.elapsed())
        };
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "rate limiting destination call");
            tokio::time::sleep(wait).await;
        }
    }

    /// Record that a call was just attempted.
    pub async fn mark(&self) {
        *self.last_call.lock().await = Instant::now();
    }
}
