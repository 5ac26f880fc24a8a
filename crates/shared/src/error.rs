//! Error taxonomy for content acquisition.
//!
//! Acquisition errors are never shown to a caller of a façade function; they
//! drive the fallback policy and feed the recent-error tracker instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a live acquisition attempt did not produce a payload
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AcquisitionError {
    /// Non-2xx status, network failure, or a body that is not JSON
    #[error("upstream unavailable for {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    /// HTTP 429 from the upstream
    #[error("rate limited by upstream for {url}")]
    RateLimited { url: String },

    /// Fetch race lost against its timer, or a per-attempt timeout fired
    #[error("request for {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// The device reports no connectivity and no cached copy exists
    #[error("device is offline, no cached copy of {url}")]
    Offline { url: String },

    /// Recent rate-limit errors suppress live calls to this upstream
    #[error("live calls to {upstream} suppressed after repeated rate limiting")]
    ShortCircuited { upstream: String },
}

impl AcquisitionError {
    /// Build an `UpstreamUnavailable` from anything printable
    pub fn unavailable(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Offline { .. } => ErrorKind::Offline,
            Self::ShortCircuited { .. } => ErrorKind::ShortCircuited,
        }
    }

    /// Whether another attempt after a backoff could succeed.
    ///
    /// Rate limiting is excluded: retrying only deepens the penalty.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::Timeout { .. }
        )
    }
}

/// Coarse error classification kept by the recent-error tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UpstreamUnavailable,
    RateLimited,
    Timeout,
    Offline,
    ShortCircuited,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UpstreamUnavailable => write!(f, "upstream_unavailable"),
            ErrorKind::RateLimited => write!(f, "rate_limited"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Offline => write!(f, "offline"),
            ErrorKind::ShortCircuited => write!(f, "short_circuited"),
        }
    }
}

/// Programmer errors raised synchronously by façade functions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("a non-zero {what} id is required")]
    MissingId { what: &'static str },
}
