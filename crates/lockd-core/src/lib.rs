//! lockd-core: in-memory registry and state machine for the lockd
//! distributed lock service.
//!
//! A single process's view of who holds what. No disk, no network, no
//! replication — callers (the `lockd-server` HTTP layer, or a test harness)
//! own one [`registry::LockRegistry`] and talk to it directly.

pub mod config;
pub mod errors;
pub mod lease;
pub mod registry;
pub mod sweeper;

pub use config::RegistryConfig;
pub use errors::LockError;
pub use lease::Lease;
pub use registry::{AcquireOutcome, LeaseView, LockRegistry};
