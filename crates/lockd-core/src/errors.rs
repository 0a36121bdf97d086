//! Registry error taxonomy (spec §7).
//!
//! Registry operations never throw to the transport layer — they return one
//! of these discriminated kinds and the handler renders it into the JSON
//! envelope. `InternalError` is reserved for invariant violations and is not
//! constructible by callers; see [`crate::registry::LockRegistry`].

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LockError {
    /// Acquire: `(namespace, business_id)` is held by a different live user.
    #[error("lock on '{namespace}/{business_id}' is held by another user")]
    LockHeld { namespace: String, business_id: String },

    /// Heartbeat/release: `lock_id` is unknown, stale, or already expired.
    #[error("lock_id '{0}' not found")]
    LockNotFound(String),

    /// Missing/empty required field or non-positive timeout.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
