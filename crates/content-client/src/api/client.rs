//! JSON clients for the two upstream styles.
//!
//! [`RateLimitedJsonClient`] sends every request through a shared FIFO
//! dispatcher (Jikan). [`RaceJsonClient`] calls the upstream directly and
//! bounds the call with a fetch race (TMDB). Both resolve through the same
//! [`AcquisitionContext`] so caching, short-circuiting, and stale reads
//! behave identically.

use super::dispatcher::Dispatcher;
use super::http::{redact, Transport};
use super::race::race_fetch;
use super::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde_json::Value;
use shared::config::{JikanConfig, ResilienceConfig, TmdbConfig};
use shared::AcquisitionError;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::fallback::FallbackProvider;
use crate::source::{AcquisitionContext, CacheClass, ContentSource};
use crate::tracker::ErrorTracker;

/// A rate-limited upstream: base URL, request queue, and error history.
///
/// One instance per upstream host, shared by every domain client that
/// talks to it so they all respect the same spacing.
pub struct RateLimitedUpstream {
    base_url: String,
    dispatcher: Dispatcher,
    errors: ErrorTracker,
}

impl RateLimitedUpstream {
    /// Spawn the upstream's dispatcher on the current runtime
    pub fn spawn(
        name: &str,
        base_url: &str,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
        errors: ErrorTracker,
    ) -> Arc<Self> {
        Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            dispatcher: Dispatcher::spawn(name, transport, limiter),
            errors,
        })
    }

    /// Jikan upstream from configuration
    pub fn jikan(
        config: &JikanConfig,
        resilience: &ResilienceConfig,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Self::spawn(
            "jikan",
            &config.base_url,
            transport,
            RateLimiter::new(
                Duration::from_millis(config.min_interval_ms),
                config.requests_per_minute,
            ),
            ErrorTracker::from_config("jikan", resilience),
        )
    }

    pub fn errors(&self) -> &ErrorTracker {
        &self.errors
    }
}

/// Dispatcher-backed client for one domain of a rate-limited upstream
pub struct RateLimitedJsonClient {
    upstream: Arc<RateLimitedUpstream>,
    context: AcquisitionContext,
    fallback: Box<dyn FallbackProvider>,
}

impl RateLimitedJsonClient {
    pub fn new(
        upstream: Arc<RateLimitedUpstream>,
        context: AcquisitionContext,
        fallback: impl FallbackProvider + 'static,
    ) -> Self {
        Self {
            upstream,
            context,
            fallback: Box::new(fallback),
        }
    }

    pub fn upstream(&self) -> &RateLimitedUpstream {
        &self.upstream
    }
}

#[async_trait]
impl ContentSource for RateLimitedJsonClient {
    async fn fetch(&self, path: &str, class: CacheClass) -> Result<Value, AcquisitionError> {
        let url = format!("{}{}", self.upstream.base_url, path);
        let url_ref = url.as_str();
        let dispatcher = &self.upstream.dispatcher;
        let policy = self.context.policy();

        self.context
            .acquire(url_ref, class, &self.upstream.errors, |profile| async move {
                let timeout = policy.request_timeout(&profile);
                let retry = policy.retry_policy(&profile);
                retry
                    .run(|attempt| async move {
                        debug!(url = url_ref, attempt = attempt + 1, "Queueing request");
                        dispatcher.enqueue(url_ref, timeout).await
                    })
                    .await
            })
            .await
    }

    fn fallback(&self) -> &dyn FallbackProvider {
        self.fallback.as_ref()
    }
}

/// Race-bounded client for an upstream without a documented rate limit
pub struct RaceJsonClient {
    base_url: String,
    api_key: Option<String>,
    race_timeout: Option<Duration>,
    transport: Arc<dyn Transport>,
    errors: ErrorTracker,
    context: AcquisitionContext,
    fallback: Box<dyn FallbackProvider>,
}

impl RaceJsonClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        race_timeout: Option<Duration>,
        transport: Arc<dyn Transport>,
        errors: ErrorTracker,
        context: AcquisitionContext,
        fallback: impl FallbackProvider + 'static,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            race_timeout,
            transport,
            errors,
            context,
            fallback: Box::new(fallback),
        }
    }

    /// TMDB client from configuration
    pub fn tmdb(
        config: &TmdbConfig,
        resilience: &ResilienceConfig,
        transport: Arc<dyn Transport>,
        context: AcquisitionContext,
        fallback: impl FallbackProvider + 'static,
    ) -> Self {
        Self::new(
            &config.base_url,
            Some(config.api_key.clone()),
            config.race_timeout_ms.map(Duration::from_millis),
            transport,
            ErrorTracker::from_config("tmdb", resilience),
            context,
            fallback,
        )
    }

    pub fn errors(&self) -> &ErrorTracker {
        &self.errors
    }

    /// URL with the API key appended; never used as a cache key or logged
    fn authorized(&self, url: &str) -> String {
        match &self.api_key {
            Some(key) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{}{}api_key={}", url, separator, urlencoding::encode(key))
            }
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl ContentSource for RaceJsonClient {
    async fn fetch(&self, path: &str, class: CacheClass) -> Result<Value, AcquisitionError> {
        let url = format!("{}{}", self.base_url, path);
        let request_url = self.authorized(&url);
        let (url_ref, request_ref) = (url.as_str(), request_url.as_str());
        let transport: &dyn Transport = self.transport.as_ref();
        let policy = self.context.policy();
        let race_timeout = self.race_timeout;

        self.context
            .acquire(url_ref, class, &self.errors, |profile| async move {
                let timeout = race_timeout.unwrap_or_else(|| policy.request_timeout(&profile));
                let retry = policy.retry_policy(&profile);
                let attempts = retry.run(|_| async move { transport.get_json(request_ref).await });

                race_fetch(&redact(request_ref), timeout, attempts)
                    .await
                    .into_result(url_ref, timeout)
            })
            .await
    }

    fn fallback(&self) -> &dyn FallbackProvider {
        self.fallback.as_ref()
    }
}
