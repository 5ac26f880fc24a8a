//! Builders for façade tests against a mock upstream.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared::config::ResilienceConfig;
use shared::AcquisitionError;

use crate::api::client::{RaceJsonClient, RateLimitedJsonClient, RateLimitedUpstream};
use crate::api::http::{HttpTransport, Transport};
use crate::api::rate_limiter::RateLimiter;
use crate::cache::TtlCache;
use crate::device::{DeviceMonitor, DevicePolicy, DeviceProfile};
use crate::fallback::StaticCatalog;
use crate::source::AcquisitionContext;
use crate::tracker::ErrorTracker;

pub fn transport() -> Arc<dyn Transport> {
    Arc::new(HttpTransport::new("content-client-test/0.1", Duration::from_secs(5)).unwrap())
}

pub fn desktop() -> (DeviceMonitor, AcquisitionContext) {
    context_for(DeviceProfile::desktop())
}

pub fn mobile() -> (DeviceMonitor, AcquisitionContext) {
    context_for(DeviceProfile {
        is_mobile: true,
        ..DeviceProfile::desktop()
    })
}

pub fn context_for(profile: DeviceProfile) -> (DeviceMonitor, AcquisitionContext) {
    let monitor = DeviceMonitor::new(profile);
    let context = AcquisitionContext::new(
        Arc::new(TtlCache::new(Duration::from_secs(600))),
        monitor.subscribe(),
        DevicePolicy::default(),
    );
    (monitor, context)
}

/// Jikan-style upstream with short spacing so tests stay fast
pub fn jikan_upstream(base_url: &str) -> Arc<RateLimitedUpstream> {
    jikan_upstream_over(base_url, transport(), Duration::from_millis(10))
}

pub fn jikan_upstream_over(
    base_url: &str,
    transport: Arc<dyn Transport>,
    spacing: Duration,
) -> Arc<RateLimitedUpstream> {
    RateLimitedUpstream::spawn(
        "jikan",
        base_url,
        transport,
        RateLimiter::new(spacing, None),
        ErrorTracker::from_config("jikan", &ResilienceConfig::default()),
    )
}

pub fn jikan_client(
    upstream: Arc<RateLimitedUpstream>,
    context: AcquisitionContext,
    catalog: StaticCatalog,
) -> RateLimitedJsonClient {
    RateLimitedJsonClient::new(upstream, context, catalog)
}

pub fn tmdb_client(base_url: &str, race_timeout: Duration, context: AcquisitionContext) -> RaceJsonClient {
    RaceJsonClient::new(
        base_url,
        Some("test-key".to_string()),
        Some(race_timeout),
        transport(),
        ErrorTracker::from_config("tmdb", &ResilienceConfig::default()),
        context,
        StaticCatalog::movies_and_tv(),
    )
}

/// In-process upstream for paused-clock tests: fails the first `failures`
/// calls with HTTP 503, then serves `body`
pub struct ScriptedTransport {
    body: Value,
    failures: u32,
    latency: Duration,
    calls: AtomicU32,
}

impl ScriptedTransport {
    pub fn new(body: Value, failures: u32, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            body,
            failures,
            latency,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &str) -> Result<Value, AcquisitionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if call < self.failures {
            return Err(AcquisitionError::unavailable(url, "HTTP 503"));
        }
        Ok(self.body.clone())
    }
}
