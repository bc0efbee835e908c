//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - TTL Cleanup: sweeps expired entries at a configured interval, either
//!   given directly or read from the swept cache's options

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_configured_cleanup, CleanupHandle};
