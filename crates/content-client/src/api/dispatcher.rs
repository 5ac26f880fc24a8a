//! FIFO request dispatcher for rate-limited upstreams.
//!
//! Every request to an upstream goes through one queue drained by a single
//! worker task, so at most one request is in flight and request starts are
//! spaced by the upstream's [`RateLimiter`]. A failure answers only the
//! request that caused it; the worker moves on to the next item.

use super::http::Transport;
use super::rate_limiter::RateLimiter;
use serde_json::Value;
use shared::AcquisitionError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A request waiting in the queue, answered exactly once
struct QueuedRequest {
    url: String,
    /// Budget for the network call only; time spent queued does not count
    timeout: Duration,
    respond: oneshot::Sender<Result<Value, AcquisitionError>>,
}

/// Handle to an upstream's request queue
///
/// Cloning the handle shares the queue. The worker stops once every handle
/// is dropped and the queue is empty.
#[derive(Clone)]
pub struct Dispatcher {
    upstream: Arc<str>,
    queue: mpsc::UnboundedSender<QueuedRequest>,
}

impl Dispatcher {
    /// Spawn the queue worker on the current tokio runtime
    pub fn spawn(upstream: &str, transport: Arc<dyn Transport>, limiter: RateLimiter) -> Self {
        let (queue, requests) = mpsc::unbounded_channel();
        let upstream: Arc<str> = Arc::from(upstream);

        info!(
            upstream = %upstream,
            min_interval_ms = limiter.min_interval().as_millis() as u64,
            "Starting request dispatcher"
        );
        tokio::spawn(drain(upstream.clone(), requests, transport, limiter));

        Self { upstream, queue }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Queue a GET and wait for its own response.
    ///
    /// `timeout` bounds the request once it is dispatched, so a long queue
    /// never turns a healthy upstream into a timeout.
    pub async fn enqueue(
        &self,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Value, AcquisitionError> {
        let url = url.into();
        let (respond, response) = oneshot::channel();

        self.queue
            .send(QueuedRequest {
                url: url.clone(),
                timeout,
                respond,
            })
            .map_err(|_| AcquisitionError::unavailable(url.clone(), "dispatcher stopped"))?;

        response
            .await
            .map_err(|_| AcquisitionError::unavailable(url, "dispatcher dropped the request"))?
    }
}

async fn drain(
    upstream: Arc<str>,
    mut requests: mpsc::UnboundedReceiver<QueuedRequest>,
    transport: Arc<dyn Transport>,
    mut limiter: RateLimiter,
) {
    while let Some(QueuedRequest {
        url,
        timeout,
        mut respond,
    }) = requests.recv().await
    {
        if respond.is_closed() {
            debug!(upstream = %upstream, url = %url, "Caller gave up before dispatch, skipping");
            continue;
        }

        limiter.acquire().await;
        if respond.is_closed() {
            debug!(upstream = %upstream, url = %url, "Caller gave up while waiting, skipping");
            continue;
        }
        debug!(upstream = %upstream, url = %url, "Dispatching request");

        // A caller that stops waiting cancels its in-flight request
        let outcome = tokio::select! {
            biased;
            _ = respond.closed() => None,
            result = tokio::time::timeout(timeout, transport.get_json(&url)) => Some(
                result.unwrap_or_else(|_| Err(AcquisitionError::Timeout {
                    url: url.clone(),
                    after: timeout,
                })),
            ),
        };

        match outcome {
            Some(result) => {
                if let Err(e) = &result {
                    warn!(upstream = %upstream, error = %e, "Queued request failed");
                }
                // The receiver may have gone away between completion and send
                let _ = respond.send(result);
            }
            None => debug!(upstream = %upstream, url = %url, "Caller gave up, request cancelled"),
        }
    }

    info!(upstream = %upstream, "Request dispatcher stopped");
}
