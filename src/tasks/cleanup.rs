//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired entries out of a cache
//! or of one of the policy layers built on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::Sweep;

// == Cleanup Handle ==
/// Owns a running sweep task. Stopping it (or dropping the handle) cancels
/// the timer; the swept cache itself stays fully usable.
#[derive(Debug)]
pub struct CleanupHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl CleanupHandle {
    /// Cancels the sweep timer.
    pub fn stop(self) {
        self.handle.abort();
        info!("Cleanup task '{}' stopped", self.name);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a background task that sweeps `target` every `interval`.
///
/// Sweeps run one after another inside a single task, so a slow sweep
/// delays the next one instead of overlapping it; ticks missed meanwhile
/// are skipped rather than replayed in a burst.
///
/// # Example
/// ```ignore
/// let cache = Cache::new(CacheOptions::default())?.into_shared();
/// let cleanup = spawn_cleanup_task(cache.clone(), Duration::from_secs(300), "cache");
/// // Later, during shutdown:
/// cleanup.stop();
/// ```
pub fn spawn_cleanup_task<T>(
    target: Arc<RwLock<T>>,
    interval: Duration,
    name: &'static str,
) -> CleanupHandle
where
    T: Sweep + Send + Sync + 'static,
{
    let handle = tokio::spawn(async move {
        info!(
            "Starting cleanup task '{}' with interval of {:?}",
            name, interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = {
                let mut guard = target.write().await;
                guard.sweep()
            };

            if removed > 0 {
                info!("Cleanup '{}': removed {} expired entries", name, removed);
            } else {
                debug!("Cleanup '{}': no expired entries found", name);
            }
        }
    });

    CleanupHandle { name, handle }
}

/// Spawns the sweep `target`'s own options ask for.
///
/// Reads `auto_cleanup` and `cleanup_interval` from the target's
/// [`CacheOptions`](crate::cache::CacheOptions). Returns None when
/// `auto_cleanup` is off, leaving expired entries to lazy removal.
pub async fn spawn_configured_cleanup<T>(
    target: Arc<RwLock<T>>,
    name: &'static str,
) -> Option<CleanupHandle>
where
    T: Sweep + Send + Sync + 'static,
{
    let (enabled, interval) = {
        let guard = target.read().await;
        let options = guard.options();
        (options.auto_cleanup, options.cleanup_interval)
    };

    if !enabled {
        info!("Cleanup task '{}' disabled; expired entries are removed lazily", name);
        return None;
    }
    Some(spawn_cleanup_task(target, interval, name))
}
