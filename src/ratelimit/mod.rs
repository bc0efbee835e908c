//! Rate Limit Module
//!
//! Fixed-window request limiting per client and endpoint class, with the
//! counters kept in the cache engine.

mod limiter;
mod policy;
mod store;

pub use limiter::{RateLimitDecision, RateLimiter, Ticket, ANONYMOUS_CLIENT};
pub use policy::{ClassLimit, EndpointClass, FailureMode, RateLimitConfig, RouteRule};
pub use store::{CacheCounterStore, Counter, CounterStore, DEFAULT_STORE_CAPACITY};
