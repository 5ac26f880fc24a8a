//! Request spacing for rate-limited upstreams.
//!
//! Enforces a minimum interval between request starts and, optionally, a cap
//! on the number of requests started in any rolling minute.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const MINUTE: Duration = Duration::from_secs(60);

/// Rate limiter with a start-to-start interval and an optional per-minute cap
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between request starts
    min_interval: Duration,
    /// Maximum requests per rolling minute
    max_per_minute: Option<u32>,
    /// Last request start
    last_request: Option<Instant>,
    /// Request starts in the last minute, oldest first
    recent_requests: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(min_interval: Duration, max_per_minute: Option<u32>) -> Self {
        Self {
            min_interval,
            max_per_minute,
            last_request: None,
            recent_requests: VecDeque::new(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may start, then record its start time
    pub async fn acquire(&mut self) -> Instant {
        if let Some(max) = self.max_per_minute.filter(|max| *max > 0) {
            self.prune(Instant::now());
            if self.recent_requests.len() >= max as usize {
                // Wait until the oldest start leaves the window
                if let Some(&oldest) = self.recent_requests.front() {
                    let wait_time = MINUTE.saturating_sub(oldest.elapsed());
                    tracing::debug!(
                        wait_ms = wait_time.as_millis() as u64,
                        "Rate limit: waiting for per-minute limit"
                    );
                    sleep(wait_time).await;
                    self.prune(Instant::now());
                }
            }
        }

        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!(
                    wait_ms = wait_time.as_millis() as u64,
                    "Rate limit: waiting for minimum interval"
                );
                sleep(wait_time).await;
            }
        }

        let request_time = Instant::now();
        self.last_request = Some(request_time);
        if self.max_per_minute.is_some() {
            self.recent_requests.push_back(request_time);
        }
        request_time
    }

    /// Get the current number of requests in the last minute
    pub fn current_minute_count(&mut self) -> usize {
        self.prune(Instant::now());
        self.recent_requests.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.recent_requests.front() {
            if now.duration_since(oldest) >= MINUTE {
                self.recent_requests.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_minimum_interval() {
        let mut limiter = RateLimiter::new(Duration::from_millis(1000), None);

        let mut starts = Vec::new();
        for _ in 0..3 {
            starts.push(limiter.acquire().await);
        }

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5), None);
        let before = Instant::now();
        let start = limiter.acquire().await;
        assert_eq!(start, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_minute_cap() {
        let mut limiter = RateLimiter::new(Duration::from_millis(10), Some(3));

        let first = limiter.acquire().await;
        for _ in 0..2 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.current_minute_count(), 3);

        // Fourth start has to wait for the first to leave the window
        let fourth = limiter.acquire().await;
        assert!(fourth - first >= MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_needs_no_wait() {
        let mut limiter = RateLimiter::new(Duration::from_millis(1000), None);
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(3)).await;

        let before = Instant::now();
        let start = limiter.acquire().await;
        assert_eq!(start, before);
    }

    #[test]
    fn test_current_minute_count() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500), Some(50));
        assert_eq!(limiter.current_minute_count(), 0);
    }
}
