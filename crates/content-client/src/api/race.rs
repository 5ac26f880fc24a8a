//! Bounded fetch race.
//!
//! The network call and a timer run together and whichever settles first
//! decides the outcome. When the timer wins the fetch future is dropped,
//! which aborts the underlying request instead of leaving it running.

use serde_json::Value;
use shared::AcquisitionError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Result of a single race
#[derive(Debug)]
pub enum RaceOutcome {
    /// The fetch settled first with a payload
    Live(Value),
    /// The timer settled first
    TimedOut,
    /// The fetch settled first with an error
    Failed(AcquisitionError),
}

impl RaceOutcome {
    pub fn into_result(self, url: &str, timeout: Duration) -> Result<Value, AcquisitionError> {
        match self {
            RaceOutcome::Live(value) => Ok(value),
            RaceOutcome::TimedOut => Err(AcquisitionError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
            RaceOutcome::Failed(e) => Err(e),
        }
    }
}

/// Race `fetch` against a `timeout` timer
pub async fn race_fetch<F>(url: &str, timeout: Duration, fetch: F) -> RaceOutcome
where
    F: Future<Output = Result<Value, AcquisitionError>>,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(value)) => RaceOutcome::Live(value),
        Ok(Err(e)) => RaceOutcome::Failed(e),
        Err(_) => {
            debug!(url = url, timeout_ms = timeout.as_millis() as u64, "Fetch race lost to timer");
            RaceOutcome::TimedOut
        }
    }
}
