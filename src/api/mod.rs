//! API Module
//!
//! HTTP handlers, rate limiting and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `GET /keys` - List keys, most recently used first
//! - `POST /cleanup` - Sweep expired entries now
//! - `DELETE /clear` - Drop every cache entry
//! - `PUT /responses` - Cache a response for (text, options)
//! - `POST /responses/lookup` - Look up a cached response
//! - `GET /stats` - Statistics for every store
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{client_id, rate_limit};
pub use routes::create_router;
