//! Recent-error tracker.
//!
//! A short negative cache per upstream: the last few errors with the time
//! they happened. Consulted before every live call so a known-broken or
//! rate-limiting upstream is not hammered.

use shared::config::ResilienceConfig;
use shared::ErrorKind;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub at: Instant,
}

/// Bounded list of recent errors for one upstream
pub struct ErrorTracker {
    upstream: String,
    capacity: usize,
    window: Duration,
    rate_limit_threshold: usize,
    entries: Mutex<VecDeque<ErrorRecord>>,
}

impl ErrorTracker {
    pub fn new(
        upstream: impl Into<String>,
        capacity: usize,
        window: Duration,
        rate_limit_threshold: usize,
    ) -> Self {
        Self {
            upstream: upstream.into(),
            capacity: capacity.max(1),
            window,
            rate_limit_threshold: rate_limit_threshold.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_config(upstream: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self::new(
            upstream,
            config.error_history,
            Duration::from_secs(config.error_window_seconds),
            config.rate_limit_threshold,
        )
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<ErrorRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Record an error, dropping the oldest when full
    pub fn record(&self, kind: ErrorKind) {
        let mut entries = self.entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ErrorRecord {
            kind,
            at: Instant::now(),
        });
        debug!(upstream = %self.upstream, kind = %kind, recorded = entries.len(), "Recorded upstream error");
    }

    /// Errors of `kind` inside the window
    pub fn recent(&self, kind: ErrorKind) -> usize {
        self.entries()
            .iter()
            .filter(|record| record.kind == kind && record.at.elapsed() < self.window)
            .count()
    }

    /// Whether live calls should be skipped in favour of fallback data
    pub fn should_short_circuit(&self) -> bool {
        let rate_limited = self.recent(ErrorKind::RateLimited);
        let suppress = rate_limited >= self.rate_limit_threshold;
        if suppress {
            warn!(
                upstream = %self.upstream,
                rate_limited = rate_limited,
                "Upstream recently rate limited, skipping live call"
            );
        }
        suppress
    }

    /// Copy of the recorded errors, oldest first
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.entries().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
