//! Upstream access: HTTP transport, request queueing, and the fetch race.
//!
//! Jikan requests go through a rate-limited FIFO dispatcher; TMDB requests
//! are bounded by a fetch race. Both end up as plain JSON values that the
//! façades normalize.

pub mod client;
pub mod dispatcher;
pub mod http;
pub mod race;
pub mod rate_limiter;
pub mod types;

pub use client::{RaceJsonClient, RateLimitedJsonClient, RateLimitedUpstream};
pub use dispatcher::Dispatcher;
pub use http::{HttpTransport, Transport};
pub use race::{race_fetch, RaceOutcome};
pub use rate_limiter::RateLimiter;
