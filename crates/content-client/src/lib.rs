//! Resilient content acquisition for movies, TV, anime and manga.
//!
//! This library provides the façades the application calls for content
//! lists and details. Each façade hides which path served the data:
//! - TTL cache keyed by request URL
//! - Rate-limited FIFO dispatcher (Jikan) or bounded fetch race (TMDB)
//! - Device-aware retry with capped exponential backoff
//! - Recent-error tracker that short-circuits a rate-limiting upstream
//! - Static fallback catalogs flagged as mock data

pub mod anime;
pub mod api;
pub mod cache;
pub mod device;
pub mod embed;
pub mod fallback;
pub mod jikan;
pub mod manga;
pub mod media;
pub mod retry;
pub mod source;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use anime::AnimeClient;
pub use api::{HttpTransport, RaceJsonClient, RateLimitedJsonClient, RateLimitedUpstream, Transport};
pub use cache::{CacheStats, TtlCache};
pub use device::{ConnectionType, DeviceMonitor, DevicePolicy, DeviceProfile, DeviceSignals, NetworkEvent};
pub use embed::EmbedUrls;
pub use fallback::{FallbackProvider, RequestKind, RequestSignature, StaticCatalog};
pub use manga::MangaClient;
pub use media::{MediaClient, TrendingScope};
pub use retry::RetryPolicy;
pub use source::{AcquisitionContext, CacheClass, ContentSource};
pub use tracker::ErrorTracker;

use anyhow::{Context, Result};
use shared::Config;
use std::sync::Arc;
use std::time::Duration;

/// User agent sent to every upstream
pub const USER_AGENT: &str = concat!("content-client/", env!("CARGO_PKG_VERSION"));

/// Every façade wired to one cache, one device monitor, and one Jikan queue
pub struct ContentClients {
    pub media: MediaClient,
    pub anime: AnimeClient,
    pub manga: MangaClient,
    pub embeds: EmbedUrls,
    pub monitor: DeviceMonitor,
    pub cache: Arc<TtlCache>,
}

impl ContentClients {
    /// Build the clients; must run inside a tokio runtime
    pub fn from_config(config: &Config) -> Result<Self> {
        let resilience = &config.resilience;
        let transport_timeout = Duration::from_millis(
            resilience
                .mobile_timeout_ms
                .max(resilience.desktop_timeout_ms),
        );
        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::new(USER_AGENT, transport_timeout)
                .context("Failed to create HTTP transport")?,
        );

        let monitor = DeviceMonitor::detect(&DeviceSignals::from_config(&config.device));
        let policy = DevicePolicy::new(config.resilience.clone(), config.cache.clone());
        let cache = Arc::new(TtlCache::new(Duration::from_secs(
            config.cache.list_ttl_seconds,
        )));
        let context = AcquisitionContext::new(cache.clone(), monitor.subscribe(), policy);

        let jikan = RateLimitedUpstream::jikan(&config.jikan, resilience, transport.clone());
        let anime = AnimeClient::new(RateLimitedJsonClient::new(
            jikan.clone(),
            context.clone(),
            StaticCatalog::anime(),
        ));
        let manga = MangaClient::new(RateLimitedJsonClient::new(
            jikan,
            context.clone(),
            StaticCatalog::manga(),
        ));

        if config.tmdb.api_key.trim().is_empty() {
            tracing::warn!("No TMDB API key configured, movie and TV data will fall back to mock data");
        }
        let media = MediaClient::new(
            RaceJsonClient::tmdb(
                &config.tmdb,
                resilience,
                transport,
                context,
                StaticCatalog::movies_and_tv(),
            ),
            &config.tmdb.image_base_url,
        );

        Ok(Self {
            media,
            anime,
            manga,
            embeds: EmbedUrls::from_config(&config.player),
            monitor,
            cache,
        })
    }
}
