//! Rate Limiter
//!
//! Fixed-window limiting per (client, endpoint class). Bursts straddling a
//! window boundary can reach twice the nominal rate.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{duration_ms, SharedClock, SystemClock};
use crate::error::Result;
use crate::ratelimit::{
    ClassLimit, Counter, CounterStore, EndpointClass, FailureMode, RateLimitConfig,
};

/// Bucket for requests that carry no client identifier.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

// == Decision ==
/// Outcome of counting one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the current window ends, in whole Unix seconds (rounded up)
    pub reset_epoch_seconds: u64,
    /// Only set on denial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Identifies a counted request so its outcome can be reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub key: String,
    pub class: EndpointClass,
    /// Window the request was counted in; None if it was never counted
    pub window_start_ms: Option<u64>,
}

fn ceil_seconds(ms: u64) -> u64 {
    ms.div_ceil(1000)
}

// == Rate Limiter ==
/// Counts requests in a [`CounterStore`] and turns counts into decisions.
#[derive(Debug)]
pub struct RateLimiter<S> {
    store: S,
    config: RateLimitConfig,
    clock: SharedClock,
}

impl<S> RateLimiter<S>
where
    S: CounterStore,
{
    pub fn new(store: S, config: RateLimitConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// The clock should be the one the store's entries expire by.
    pub fn with_clock(store: S, config: RateLimitConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            clock,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counter key for `client` in `class`.
    pub fn counter_key(client: Option<&str>, class: EndpointClass) -> String {
        let client = client
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(ANONYMOUS_CLIENT);
        format!("{}:{}", client, class)
    }

    /// Classifies the request and counts it.
    pub async fn check(
        &self,
        client: Option<&str>,
        method: &str,
        path: &str,
    ) -> (RateLimitDecision, Ticket) {
        let class = self.config.classify(method, path);
        self.check_class(client, class).await
    }

    /// Counts one request from `client` against `class`.
    pub async fn check_class(
        &self,
        client: Option<&str>,
        class: EndpointClass,
    ) -> (RateLimitDecision, Ticket) {
        let limit = *self.config.limit_for(class);
        let key = Self::counter_key(client, class);
        let now = self.clock.now_ms();

        match self.store.increment(&key, limit.window, now).await {
            Ok(counter) => {
                let decision = decide(&limit, &counter, now);
                if !decision.allowed {
                    debug!(key = %key, count = counter.count, "Rate limit exceeded");
                }
                let ticket = Ticket {
                    key,
                    class,
                    window_start_ms: Some(counter.window_start_ms),
                };
                (decision, ticket)
            }
            Err(e) => {
                let decision = self.on_store_failure(&limit, now);
                warn!(
                    key = %key,
                    error = %e,
                    allowed = decision.allowed,
                    "Rate limit store unavailable"
                );
                let ticket = Ticket {
                    key,
                    class,
                    window_start_ms: None,
                };
                (decision, ticket)
            }
        }
    }

    /// Reports the final response status for a counted request.
    ///
    /// Classes that skip successful requests get the request refunded when
    /// `status` is below 400. Returns whether a refund happened.
    pub async fn complete(&self, ticket: &Ticket, status: u16) -> bool {
        let limit = self.config.limit_for(ticket.class);
        if !limit.skip_successful_requests || status >= 400 {
            return false;
        }
        let Some(window_start_ms) = ticket.window_start_ms else {
            return false;
        };

        match self.store.refund(&ticket.key, limit.window, window_start_ms).await {
            Ok(refunded) => refunded,
            Err(e) => {
                warn!(key = %ticket.key, error = %e, "Failed to refund rate limit counter");
                false
            }
        }
    }

    fn on_store_failure(&self, limit: &ClassLimit, now: u64) -> RateLimitDecision {
        let window_ms = duration_ms(limit.window);
        let reset_epoch_seconds = ceil_seconds(now.saturating_add(window_ms));

        match self.config.failure_mode {
            FailureMode::Open => RateLimitDecision {
                allowed: true,
                limit: limit.max_requests,
                remaining: limit.max_requests,
                reset_epoch_seconds,
                retry_after_seconds: None,
            },
            FailureMode::Closed => RateLimitDecision {
                allowed: false,
                limit: limit.max_requests,
                remaining: 0,
                reset_epoch_seconds,
                retry_after_seconds: Some(ceil_seconds(window_ms)),
            },
        }
    }
}

fn decide(limit: &ClassLimit, counter: &Counter, now: u64) -> RateLimitDecision {
    let window_end = counter.window_end_ms(limit.window);
    let reset_epoch_seconds = ceil_seconds(window_end);

    if counter.count <= limit.max_requests {
        RateLimitDecision {
            allowed: true,
            limit: limit.max_requests,
            remaining: limit.max_requests - counter.count,
            reset_epoch_seconds,
            retry_after_seconds: None,
        }
    } else {
        RateLimitDecision {
            allowed: false,
            limit: limit.max_requests,
            remaining: 0,
            reset_epoch_seconds,
            retry_after_seconds: Some(ceil_seconds(window_end.saturating_sub(now))),
        }
    }
}
