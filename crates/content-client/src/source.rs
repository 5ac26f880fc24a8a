//! Acquisition pipeline shared by every upstream client.
//!
//! Order of a lookup: fresh cache entry, then the offline and short-circuit
//! checks, then the live path supplied by the client. A live failure is
//! recorded against the upstream and answered from a stale cache copy when
//! one exists. Whatever is left over goes to the fallback provider.

use async_trait::async_trait;
use serde_json::Value;
use shared::{AcquisitionError, ContentRecord, MediaType};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::device::{DevicePolicy, DeviceProfile};
use crate::fallback::{unavailable_record, FallbackProvider, RequestKind, RequestSignature};
use crate::tracker::ErrorTracker;

/// Which TTL applies to a cached response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    /// Single-title details
    Metadata,
    /// Derived lists (trending, search, recommendations)
    List,
}

/// Cache, device profile, and policy handed to every client
#[derive(Clone)]
pub struct AcquisitionContext {
    cache: Arc<TtlCache>,
    profile: watch::Receiver<DeviceProfile>,
    policy: DevicePolicy,
}

impl AcquisitionContext {
    pub fn new(
        cache: Arc<TtlCache>,
        profile: watch::Receiver<DeviceProfile>,
        policy: DevicePolicy,
    ) -> Self {
        Self {
            cache,
            profile,
            policy,
        }
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn policy(&self) -> &DevicePolicy {
        &self.policy
    }

    /// Current device profile
    pub fn profile(&self) -> DeviceProfile {
        *self.profile.borrow()
    }

    pub fn ttl(&self, class: CacheClass, profile: &DeviceProfile) -> Duration {
        match class {
            CacheClass::Metadata => self.policy.metadata_ttl(),
            CacheClass::List => self.policy.list_ttl(profile),
        }
    }

    /// Resolve `url` from cache or through `live`.
    ///
    /// `live` receives the profile read at the start of the lookup so retry
    /// counts and timeouts stay consistent for the whole call.
    pub async fn acquire<F, Fut>(
        &self,
        url: &str,
        class: CacheClass,
        errors: &ErrorTracker,
        live: F,
    ) -> Result<Value, AcquisitionError>
    where
        F: FnOnce(DeviceProfile) -> Fut,
        Fut: Future<Output = Result<Value, AcquisitionError>>,
    {
        let profile = self.profile();
        if let Some(payload) = self.cache.get_within(url, self.ttl(class, &profile)) {
            return Ok(payload);
        }

        if profile.is_offline {
            debug!(url = url, "Device offline, skipping live call");
            return self.stale_or(
                url,
                AcquisitionError::Offline {
                    url: url.to_string(),
                },
            );
        }

        if errors.should_short_circuit() {
            return self.stale_or(
                url,
                AcquisitionError::ShortCircuited {
                    upstream: errors.upstream().to_string(),
                },
            );
        }

        match live(profile).await {
            Ok(payload) => {
                self.cache.set(url, payload.clone());
                Ok(payload)
            }
            Err(e) => {
                errors.record(e.kind());
                self.stale_or(url, e)
            }
        }
    }

    /// Emergency read of an expired entry, else the original error
    fn stale_or(&self, url: &str, error: AcquisitionError) -> Result<Value, AcquisitionError> {
        match self.cache.get_stale(url) {
            Some(payload) => {
                warn!(url = url, error = %error, "Serving stale cache entry");
                Ok(payload)
            }
            None => Err(error),
        }
    }
}

/// One upstream as seen by a façade
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Resolve a path relative to the upstream's base URL
    async fn fetch(&self, path: &str, class: CacheClass) -> Result<Value, AcquisitionError>;

    fn fallback(&self) -> &dyn FallbackProvider;
}

/// Fetch a list and normalize it, substituting fallback data on any failure
pub async fn list_or_fallback<S, N>(
    source: &S,
    path: &str,
    signature: RequestSignature,
    normalize: N,
) -> Vec<ContentRecord>
where
    S: ContentSource + ?Sized,
    N: FnOnce(Value) -> Result<Vec<ContentRecord>, serde_json::Error>,
{
    let error = match source.fetch(path, CacheClass::List).await {
        Ok(payload) => match normalize(payload) {
            Ok(records) => return records,
            Err(e) => AcquisitionError::unavailable(path, format!("unexpected response shape: {}", e)),
        },
        Err(e) => e,
    };

    warn!(path = path, error = %error, kind = %error.kind(), "Using fallback data");
    source.fallback().mock_for(&signature)
}

/// Fetch a single record, substituting a fallback record on any failure
pub async fn single_or_fallback<S, N>(
    source: &S,
    path: &str,
    signature: RequestSignature,
    normalize: N,
) -> ContentRecord
where
    S: ContentSource + ?Sized,
    N: FnOnce(Value) -> Result<ContentRecord, serde_json::Error>,
{
    let error = match source.fetch(path, CacheClass::Metadata).await {
        Ok(payload) => match normalize(payload) {
            Ok(record) => return record,
            Err(e) => AcquisitionError::unavailable(path, format!("unexpected response shape: {}", e)),
        },
        Err(e) => e,
    };

    warn!(path = path, error = %error, kind = %error.kind(), "Using fallback record");
    let id = match signature.kind {
        RequestKind::Details(id) => id,
        _ => 0,
    };
    let media = signature.media.unwrap_or(MediaType::Movie);
    source
        .fallback()
        .mock_for(&signature)
        .into_iter()
        .next()
        .unwrap_or_else(|| unavailable_record(id, media))
}
