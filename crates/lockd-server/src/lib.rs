//! lockd HTTP Server Library
//!
//! Wires the [`lockd_core`] registry to an axum JSON API.

pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use lockd_core::LockRegistry;

pub use routes::create_routes;

/// Shared application state: the registry plus process-start time for the
/// health endpoint's uptime figure.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<LockRegistry>,
    started_at: Instant,
}

impl AppState {
    pub fn new(registry: Arc<LockRegistry>) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
