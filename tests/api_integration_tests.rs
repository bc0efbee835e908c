//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each endpoint, including the
//! rate-limit middleware. Time is driven by a manual clock.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
    Router,
};
use lru_ttl_cache::{
    api::create_router,
    cache::Cache,
    clock::ManualClock,
    ratelimit::{
        CacheCounterStore, ClassLimit, EndpointClass, RateLimitConfig, RateLimiter, RouteRule,
    },
    response::ResponseCache,
    AppState, Config,
};
use serde_json::Value;
use tower::ServiceExt;

const NOW: u64 = 1_700_000_000_000;

// == Helper Functions ==

fn create_test_app() -> (Router, ManualClock) {
    create_app_with_config(Config::default())
}

fn create_app_with_config(config: Config) -> (Router, ManualClock) {
    let clock = ManualClock::new(NOW);
    let state = AppState::with_clock(&config, clock.shared()).unwrap();
    (create_router(state), clock)
}

/// App whose limiter uses `limits` instead of the defaults.
fn create_app_with_limits(limits: RateLimitConfig) -> (Router, ManualClock) {
    let clock = ManualClock::new(NOW);
    let config = Config::default();

    let cache = Cache::with_clock(config.cache_options(), clock.shared()).unwrap();
    let responses = ResponseCache::with_clock(config.response_options(), clock.shared()).unwrap();
    let store = CacheCounterStore::with_clock(1_000, clock.shared()).unwrap();
    let limiter = RateLimiter::with_clock(store, limits, clock.shared()).unwrap();

    (
        create_router(AppState::new(cache, responses, limiter)),
        clock,
    )
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn client_request(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-client-id", client)
        .body(Body::empty())
        .unwrap()
}

/// Request arriving on a connection from `peer`.
fn peer_request(uri: &str, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    Request::builder()
        .uri(uri)
        .extension(ConnectInfo(addr))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header(response: &Response<Body>, name: &str) -> String {
    response
        .headers()
        .get(name)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let (app, _) = create_test_app();

    let response = send(
        &app,
        json_request("PUT", "/set", r#"{"key":"test_key","value":"test_value"}"#),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_invalid_key() {
    let (app, _) = create_test_app();

    let response = send(&app, json_request("PUT", "/set", r#"{"key":"","value":1}"#)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_set_endpoint_rejects_unsizeable_value() {
    let (app, _) = create_test_app();
    let nested = format!("{}{}", "[".repeat(70), "]".repeat(70));
    let body = format!(r#"{{"key":"deep","value":{}}}"#, nested);

    let response = send(&app, json_request("PUT", "/set", &body)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&app, empty_request("GET", "/get/deep")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let (app, _) = create_test_app();

    let set_response = send(
        &app,
        json_request("PUT", "/set", r#"{"key":"get_key","value":{"n":[1,2]}}"#),
    )
    .await;
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = send(&app, empty_request("GET", "/get/get_key")).await;

    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response.into_body()).await;
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"]["n"][1], 2);
    assert!(json.get("ttlRemainingMs").is_none());
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let (app, _) = create_test_app();

    let response = send(&app, empty_request("GET", "/get/nonexistent_key")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent_key"));
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint() {
    let (app, _) = create_test_app();
    send(&app, json_request("PUT", "/set", r#"{"key":"del_key","value":"v"}"#)).await;

    let response = send(&app, empty_request("DELETE", "/del/del_key")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", "/get/del_key")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, empty_request("DELETE", "/del/del_key")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Eviction and Expiry Tests ==

#[tokio::test]
async fn test_capacity_eviction_keeps_recently_read_key() {
    let (app, _) = create_app_with_config(Config {
        cache_capacity: 2,
        ..Config::default()
    });

    send(&app, json_request("PUT", "/set", r#"{"key":"a","value":1}"#)).await;
    send(&app, json_request("PUT", "/set", r#"{"key":"b","value":2}"#)).await;
    send(&app, empty_request("GET", "/get/a")).await;
    send(&app, json_request("PUT", "/set", r#"{"key":"c","value":3}"#)).await;

    let response = send(&app, empty_request("GET", "/keys")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["keys"], serde_json::json!(["c", "a"]));

    let stats = body_to_json(send(&app, empty_request("GET", "/stats")).await.into_body()).await;
    assert_eq!(stats["cache"]["evictions"], 1);
}

#[tokio::test]
async fn test_ttl_expiry() {
    let (app, clock) = create_test_app();
    send(
        &app,
        json_request("PUT", "/set", r#"{"key":"short","value":"v","ttl":5}"#),
    )
    .await;

    clock.advance(Duration::from_secs(2));
    let response = send(&app, empty_request("GET", "/get/short")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ttlRemainingMs"], 3_000);

    clock.advance(Duration::from_secs(4));
    let response = send(&app, empty_request("GET", "/get/short")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_default_ttl_from_config() {
    let (app, clock) = create_app_with_config(Config {
        cache_default_ttl: 10,
        ..Config::default()
    });
    send(&app, json_request("PUT", "/set", r#"{"key":"k","value":"v"}"#)).await;

    clock.advance(Duration::from_secs(11));
    let response = send(&app, empty_request("GET", "/get/k")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cleanup_and_clear_endpoints() {
    let (app, clock) = create_test_app();
    send(
        &app,
        json_request("PUT", "/set", r#"{"key":"old","value":1,"ttl":1}"#),
    )
    .await;
    send(&app, json_request("PUT", "/set", r#"{"key":"keep","value":2}"#)).await;

    clock.advance(Duration::from_secs(2));
    let response = send(&app, empty_request("POST", "/cleanup")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"], 1);

    let response = send(&app, empty_request("DELETE", "/clear")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cleared"], 1);

    let json = body_to_json(send(&app, empty_request("GET", "/keys")).await.into_body()).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_memory_bound_evicts_oversized_value() {
    let (app, _) = create_app_with_config(Config {
        cache_max_size_bytes: 200,
        ..Config::default()
    });
    let big = "x".repeat(500);
    let body = format!(r#"{{"key":"big","value":"{}"}}"#, big);

    let response = send(&app, json_request("PUT", "/set", &body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", "/get/big")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stats = body_to_json(send(&app, empty_request("GET", "/stats")).await.into_body()).await;
    assert_eq!(stats["cache"]["totalSize"], 0);
}

// == Response Cache Tests ==

#[tokio::test]
async fn test_response_store_and_lookup() {
    let (app, clock) = create_test_app();
    let stored = send(
        &app,
        json_request(
            "PUT",
            "/responses",
            r#"{"text":"clause 7","options":{"mode":"full"},"response":{"risk":"high"}}"#,
        ),
    )
    .await;
    assert_eq!(stored.status(), StatusCode::OK);
    let stored = body_to_json(stored.into_body()).await;
    assert_eq!(stored["key"].as_str().unwrap().len(), 32);

    let found = send(
        &app,
        json_request(
            "POST",
            "/responses/lookup",
            r#"{"text":"clause 7","options":{"mode":"full"}}"#,
        ),
    )
    .await;
    assert_eq!(found.status(), StatusCode::OK);
    let found = body_to_json(found.into_body()).await;
    assert_eq!(found["response"]["risk"], "high");
    assert_eq!(found["key"], stored["key"]);

    // Responses live for thirty minutes
    clock.advance(Duration::from_secs(31 * 60));
    let expired = send(
        &app,
        json_request(
            "POST",
            "/responses/lookup",
            r#"{"text":"clause 7","options":{"mode":"full"}}"#,
        ),
    )
    .await;
    assert_eq!(expired.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_response_lookup_miss_for_other_options() {
    let (app, _) = create_test_app();
    send(
        &app,
        json_request("PUT", "/responses", r#"{"text":"t","response":"r"}"#),
    )
    .await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/responses/lookup",
            r#"{"text":"t","options":{"mode":"quick"}}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == STATS and HEALTH Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _) = create_test_app();
    send(&app, json_request("PUT", "/set", r#"{"key":"s","value":"v"}"#)).await;
    send(&app, empty_request("GET", "/get/s")).await;
    send(&app, empty_request("GET", "/get/missing")).await;

    let response = send(&app, empty_request("GET", "/stats")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["hitRate"], 0.5);
    assert_eq!(json["cache"]["size"], 1);
    assert_eq!(json["responses"]["capacity"], 50);
    // One counter per (client, class) pair seen so far
    assert_eq!(json["rateLimits"]["size"], 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let response = send(&app, empty_request("GET", "/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

// == Rate Limit Tests ==

fn three_per_second() -> RateLimitConfig {
    RateLimitConfig::default().with_limit(
        EndpointClass::General,
        ClassLimit::new(3, Duration::from_millis(1000)),
    )
}

/// Behind a proxy that sets the client id headers.
fn three_per_second_behind_proxy() -> RateLimitConfig {
    three_per_second().with_trust_proxy_headers(true)
}

#[tokio::test]
async fn test_rate_limit_headers_count_down() {
    let (app, _) = create_app_with_limits(three_per_second_behind_proxy());

    for expected in ["2", "1", "0"] {
        let response = send(&app, client_request("/health", "alice")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "ratelimit-limit"), "3");
        assert_eq!(header(&response, "ratelimit-remaining"), expected);
        assert_eq!(header(&response, "ratelimit-reset"), "1700000001");
    }
}

#[tokio::test]
async fn test_rate_limit_denies_with_retry_after() {
    let (app, clock) = create_app_with_limits(three_per_second_behind_proxy());
    for _ in 0..3 {
        send(&app, client_request("/health", "alice")).await;
    }

    let denied = send(&app, client_request("/health", "alice")).await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&denied, "retry-after"), "1");
    assert_eq!(header(&denied, "ratelimit-remaining"), "0");
    let json = body_to_json(denied.into_body()).await;
    assert_eq!(json["rateLimit"]["allowed"], false);
    assert_eq!(json["rateLimit"]["retryAfterSeconds"], 1);

    // Other clients have their own counters
    let other = send(&app, client_request("/health", "bob")).await;
    assert_eq!(other.status(), StatusCode::OK);

    // A new window starts once the old one has elapsed
    clock.advance(Duration::from_millis(1000));
    let again = send(&app, client_request("/health", "alice")).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(header(&again, "ratelimit-remaining"), "2");
}

#[tokio::test]
async fn test_rate_limit_forwarded_for_and_anonymous() {
    let (app, _) = create_app_with_limits(three_per_second_behind_proxy());

    let forwarded = Request::builder()
        .uri("/health")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, forwarded).await;
    assert_eq!(header(&response, "ratelimit-remaining"), "2");

    // No identifier at all: a separate, shared bucket
    for expected in ["2", "1"] {
        let response = send(&app, empty_request("GET", "/health")).await;
        assert_eq!(header(&response, "ratelimit-remaining"), expected);
    }
}

#[tokio::test]
async fn test_successful_requests_refunded_for_auth_class() {
    let limits = RateLimitConfig::default()
        .with_trust_proxy_headers(true)
        .with_rules(vec![RouteRule::new("/get", EndpointClass::Auth)])
        .with_limit(
            EndpointClass::Auth,
            ClassLimit::new(2, Duration::from_secs(60)).skipping_successful(),
        );
    let (app, _) = create_app_with_limits(limits);
    send(&app, json_request("PUT", "/set", r#"{"key":"k","value":"v"}"#)).await;

    // Successful reads are handed back and never exhaust the budget
    for _ in 0..5 {
        let response = send(&app, client_request("/get/k", "carol")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Failures count
    for _ in 0..2 {
        let response = send(&app, client_request("/get/missing", "carol")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    let response = send(&app, client_request("/get/k", "carol")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_keys_on_peer_address_by_default() {
    let (app, _) = create_app_with_limits(three_per_second());

    // A fresh x-client-id on every request does not buy a fresh budget
    for i in 0..3 {
        let mut request = peer_request("/health", "198.51.100.7:40000");
        request
            .headers_mut()
            .insert("x-client-id", format!("rotating-{i}").parse().unwrap());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let mut request = peer_request("/health", "198.51.100.7:40001");
    request
        .headers_mut()
        .insert("x-client-id", "rotating-3".parse().unwrap());
    let denied = send(&app, request).await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another peer is unaffected
    let other = send(&app, peer_request("/health", "198.51.100.8:40000")).await;
    assert_eq!(other.status(), StatusCode::OK);
    assert_eq!(header(&other, "ratelimit-remaining"), "2");
}

#[tokio::test]
async fn test_rate_limit_ignores_forwarded_for_unless_trusted() {
    let (app, _) = create_app_with_limits(three_per_second());

    for expected in ["2", "1"] {
        let mut request = peer_request("/health", "198.51.100.7:40000");
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        let response = send(&app, request).await;
        assert_eq!(header(&response, "ratelimit-remaining"), expected);
    }

    // Same peer without the header: same bucket
    let response = send(&app, peer_request("/health", "198.51.100.7:40002")).await;
    assert_eq!(header(&response, "ratelimit-remaining"), "0");
}

#[tokio::test]
async fn test_rate_limit_trusted_headers_override_peer() {
    let (app, _) = create_app_with_limits(three_per_second_behind_proxy());

    // Every request arrives from the proxy, each on behalf of a different client
    for client in ["alice", "bob", "carol", "dave"] {
        let mut request = peer_request("/health", "10.0.0.1:5000");
        request
            .headers_mut()
            .insert("x-client-id", client.parse().unwrap());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "ratelimit-remaining"), "2");
    }
}
