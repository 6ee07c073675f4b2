//! Multi-tier persistence orchestration.
//!
//! # Responsibility
//! - Route reads and writes across the local, fast and durable tiers.
//! - Run fire-and-forget writes on the ambient tokio runtime.
//!
//! # Invariants
//! - At most one durable write per key is outstanding.
//! - Background work is only spawned inside a runtime; outside one it is skipped.

use log::warn;
use std::future::Future;
use tokio::runtime::Handle;

pub mod coordinator;

pub use coordinator::{DurableSync, PersistenceCoordinator};

/// Spawns `task` on the current runtime without awaiting it.
pub(crate) fn spawn_background<F>(label: &'static str, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => {
            warn!("event=background_task module=sync status=skip task={label} reason=no_runtime");
        }
    }
}
