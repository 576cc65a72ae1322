// Request pacing for the hosted inference API.
//
// Free inference tiers throttle bursts, and a digest fires three calls per
// article. Every InferenceClient request waits on this limiter, which
// spaces requests at least `1 / qps` seconds apart across all tasks
// sharing it.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Minimum-interval limiter shared by clones.
#[derive(Clone)]
pub struct RateLimiter {
    interval: Option<Duration>,
    /// Earliest instant the next request may start
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Allow up to `requests_per_second`. Zero or negative disables pacing.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = (requests_per_second > 0.0)
            .then(|| Duration::from_secs_f64(1.0 / requests_per_second));
        Self {
            interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for this caller's slot.
    ///
    /// Slots are reserved under the lock and slept on outside it, so
    /// concurrent callers queue up in order instead of all waking at once.
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let start = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let start = match *next {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next = Some(start + interval);
            start
        };

        tokio::time::sleep_until(start).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_second_request_waits() {
        let limiter = RateLimiter::new(5.0); // 200ms spacing
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(150),
            "Expected ~200ms delay, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_zero_rate_disables_pacing() {
        let limiter = RateLimiter::new(0.0);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
