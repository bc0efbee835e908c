//! Rate Limit Middleware
//!
//! Counts every request against its client's limit before it reaches a
//! handler, and reports the final status back so refundable classes can
//! take successful requests back off the counter.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::CacheError;
use crate::ratelimit::RateLimitDecision;

use super::handlers::AppState;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub const RATELIMIT_LIMIT: &str = "ratelimit-limit";
pub const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "ratelimit-reset";

/// Identifies the caller.
///
/// With `trust_proxy_headers` set: `x-client-id`, else the first
/// `x-forwarded-for` hop, else the peer address. Otherwise only the peer
/// address counts. None puts the request in the anonymous bucket.
pub fn client_id(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy_headers: bool,
) -> Option<String> {
    if trust_proxy_headers {
        if let Some(id) = proxy_client_id(headers) {
            return Some(id);
        }
    }
    peer.map(|ip| ip.to_string())
}

fn proxy_client_id(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header(CLIENT_ID_HEADER)
        .or_else(|| {
            header(FORWARDED_FOR_HEADER)
                .and_then(|hops| hops.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
        })
        .map(str::to_owned)
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        RATELIMIT_RESET,
        HeaderValue::from(decision.reset_epoch_seconds),
    );
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // Identify the client from the connection (and trusted proxy headers)
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let trust = state.limiter.config().trust_proxy_headers;
    let client = client_id(request.headers(), peer, trust);
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();

    // Count the request before it reaches a handler
    let (decision, ticket) = state
        .limiter
        .check(client.as_deref(), &method, &path)
        .await;

    if !decision.allowed {
        let mut response = CacheError::RateLimited(decision.clone()).into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    // Report the outcome so refundable classes can hand it back
    let mut response = next.run(request).await;
    state
        .limiter
        .complete(&ticket, response.status().as_u16())
        .await;
    apply_headers(response.headers_mut(), &decision);
    response
}
