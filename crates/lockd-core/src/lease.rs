//! The lease value type: identity, owner, and deadline for one granted lock.
//!
//! Expiry is checked against a monotonic clock (`Instant`) so that wall-clock
//! adjustments (NTP, manual changes) can never prematurely expire or extend a
//! lease. `created_at` is wall-clock and informational only.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// A granted, time-bounded lock over `(namespace, business_id)`.
///
/// Immutable except for `deadline` and `timeout_seconds`, both of which are
/// refreshed by heartbeat or a same-user reentrant acquire.
#[derive(Debug, Clone)]
pub struct Lease {
    pub lock_id: String,
    pub namespace: String,
    pub business_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub timeout_seconds: u64,
    deadline: Instant,
    pub created_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(
        lock_id: String,
        namespace: String,
        business_id: String,
        user_id: String,
        user_name: Option<String>,
        timeout_seconds: u64,
        now: Instant,
    ) -> Self {
        Self {
            lock_id,
            namespace,
            business_id,
            user_id,
            user_name,
            timeout_seconds,
            deadline: now + std::time::Duration::from_secs(timeout_seconds),
            created_at: Utc::now(),
        }
    }

    /// `now >= deadline`: deadline is a strict lower exclusive bound on liveness
    /// (spec §4.2.1 — a lease exactly at its deadline is already expired).
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Extend the deadline from `now` using `timeout_seconds`, optionally
    /// replacing the stored `timeout_seconds` first (reentrant acquire may
    /// supply a new value; heartbeat always reuses the stored one).
    pub fn refresh(&mut self, now: Instant, timeout_seconds: Option<u64>) {
        if let Some(secs) = timeout_seconds {
            self.timeout_seconds = secs;
        }
        self.deadline = now + std::time::Duration::from_secs(self.timeout_seconds);
    }
}
