//! Background expiration sweeper (spec §4.3).
//!
//! A liveness optimisation, not a correctness dependency: every registry
//! operation already treats an expired lease as absent on its own. The
//! sweeper exists so a lease nobody ever touches again doesn't sit in the
//! map forever, and so an operator polling `/lock/list` sees expired leases
//! disappear promptly rather than only when something else stumbles over
//! them.
//!
//! Grounded on the teacher's `heartbeat.rs::start_heartbeat_thread`
//! periodic-background-loop shape, adapted from a dedicated `std::thread`
//! to a `tokio::spawn`ed task since the server already runs on `tokio`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::registry::LockRegistry;

/// Spawn the sweep loop. The returned handle can be aborted on shutdown;
/// dropping it leaves the task running, matching `tokio::spawn`'s usual
/// detached-by-default behaviour.
pub fn spawn(registry: Arc<LockRegistry>) -> JoinHandle<()> {
    let interval = Duration::from_secs(registry.config().sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; the registry starts empty.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = registry.sweep_once();
            if evicted > 0 {
                tracing::debug!(evicted, "sweep cycle complete");
            }
        }
    })
}
