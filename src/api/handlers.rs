//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Cache, SharedCache};
use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CleanupResponse, ClearResponse, DeleteResponse, GetResponse, HealthResponse, KeysResponse,
    LookupResponse, LookupResponseRequest, SetRequest, SetResponse, StatsResponse,
    StoreResponseRequest, StoredResponse,
};
use crate::ratelimit::{CacheCounterStore, RateLimiter};
use crate::response::{derive_key, ResponseCache, SharedResponseCache};

/// Application state shared across all handlers.
///
/// Each store sits behind its own lock, so a slow response lookup never
/// blocks the rate limiter.
#[derive(Clone)]
pub struct AppState {
    /// General key/value cache
    pub cache: SharedCache<String, Value>,
    /// Cached responses keyed by (text, options)
    pub responses: SharedResponseCache<Value>,
    /// Per-client request limiter
    pub limiter: Arc<RateLimiter<CacheCounterStore>>,
}

impl AppState {
    /// Creates a new AppState from already constructed stores.
    pub fn new(
        cache: Cache<String, Value>,
        responses: ResponseCache<Value>,
        limiter: RateLimiter<CacheCounterStore>,
    ) -> Self {
        Self {
            cache: cache.into_shared(),
            responses: responses.into_shared(),
            limiter: Arc::new(limiter),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`AppState::from_config`], with every store reading `clock`.
    pub fn with_clock(config: &Config, clock: SharedClock) -> Result<Self> {
        config.validate()?;

        let cache = Cache::with_clock(config.cache_options(), clock.clone())?;
        let responses = ResponseCache::with_clock(config.response_options(), clock.clone())?;
        let store = CacheCounterStore::with_options(config.rate_limit_store_options(), clock.clone())?;
        let limiter = RateLimiter::with_clock(store, config.rate_limit(), clock)?;

        Ok(Self::new(cache, responses, limiter))
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    // Acquire write lock and set the value
    let ttl = req.ttl.map(Duration::from_secs);
    let mut cache = state.cache.write().await;
    cache.set(req.key.clone(), req.value, ttl)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a read moves the entry to the front
    let mut cache = state.cache.write().await;
    let value = cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    let ttl_remaining_ms = cache
        .entry_info(&key)
        .and_then(|info| info.ttl_remaining_ms);

    Ok(Json(GetResponse::new(key, value, ttl_remaining_ms)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    // Acquire write lock
    let mut cache = state.cache.write().await;
    if !cache.delete(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /keys
pub async fn keys_handler(State(state): State<AppState>) -> Json<KeysResponse> {
    let cache = state.cache.read().await;
    Json(KeysResponse::new(cache.keys()))
}

/// Handler for POST /cleanup
///
/// Sweeps expired entries out of every store right away.
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<CleanupResponse> {
    let cache = state.cache.write().await.cleanup();
    let responses = state.responses.write().await.cleanup();
    let rate_limits = state.limiter.store().shared().write().await.cleanup();

    Json(CleanupResponse::new(cache, responses, rate_limits))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut cache = state.cache.write().await;
    let cleared = cache.len();
    cache.clear();

    Json(ClearResponse::new(cleared))
}

/// Handler for PUT /responses
pub async fn store_response_handler(
    State(state): State<AppState>,
    Json(req): Json<StoreResponseRequest>,
) -> Result<Json<StoredResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let mut responses = state.responses.write().await;
    let key = responses.set(&req.text, &req.options, req.response)?;

    Ok(Json(StoredResponse::new(key)))
}

/// Handler for POST /responses/lookup
pub async fn lookup_response_handler(
    State(state): State<AppState>,
    Json(req): Json<LookupResponseRequest>,
) -> Result<Json<LookupResponse>> {
    // Derive the key before taking the lock
    let key = derive_key(&req.text, &req.options)?;
    let mut responses = state.responses.write().await;
    let response = responses
        .engine()
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(format!("no cached response for {}", key)))?;

    Ok(Json(LookupResponse::new(key, response)))
}

/// Handler for GET /stats
///
/// Returns statistics for the cache, the response cache and the limiter's
/// counter store.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    // Read locks only; stats never touch recency
    let cache = state.cache.read().await.stats();
    let responses = state.responses.read().await.stats();
    let rate_limits = state.limiter.store().stats().await;

    Json(StatsResponse {
        cache,
        responses,
        rate_limits,
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
