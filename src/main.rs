//! LRU TTL Cache server
//!
//! Serves the cache, the response cache and the rate limiter over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lru_ttl_cache::api::create_router;
use lru_ttl_cache::{spawn_configured_cleanup, AppState, CleanupHandle, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Create the cache, response cache and rate limiter
/// 4. Start background TTL sweeps as each store's options ask
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lru_ttl_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LRU TTL Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={}, default_ttl={}s, max_size={}B, port={}, cleanup_interval={}s, trust_proxy_headers={}",
        config.cache_capacity,
        config.cache_default_ttl,
        config.cache_max_size_bytes,
        config.server_port,
        config.cleanup_interval,
        config.rate_limit_trust_proxy_headers
    );

    let state = AppState::from_config(&config).context("Invalid cache configuration")?;
    info!("Caches and rate limiter initialized");

    // Each store's own options decide whether and how often it is swept
    let cleanup_handles: Vec<CleanupHandle> = [
        spawn_configured_cleanup(state.cache.clone(), "cache").await,
        spawn_configured_cleanup(state.responses.clone(), "responses").await,
        spawn_configured_cleanup(state.limiter.store().shared(), "rate-limits").await,
    ]
    .into_iter()
    .flatten()
    .collect();

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Peer addresses identify rate-limited clients
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cleanup_handles))
    .await
    .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweeps.
async fn shutdown_signal(cleanup_handles: Vec<CleanupHandle>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in cleanup_handles {
        handle.stop();
    }
}
