//! The concurrent lock registry (spec §4.2): a map `(namespace, business_id)
//! -> Lease` plus a reverse index `lock_id -> (namespace, business_id)`,
//! mutated together under one exclusive section so the two indexes can never
//! drift apart (spec §9 "Reverse index consistency").
//!
//! Grounded on the teacher's `claim_coordinator.rs` acquire/renew/release
//! algorithm, adapted from file-locked JSONL persistence to an in-memory
//! `Mutex<Inner>` per spec's Non-goals (no persistence, no replication).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::errors::LockError;
use crate::lease::Lease;

const DEFAULT_NAMESPACE: &str = "default";

type Key = (String, String);

/// Outcome of a successful acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOutcome {
    pub lock_id: String,
    /// `true` if this acquire hit the reentrancy path (same user, same key).
    pub reentrant: bool,
}

/// A read-only view of a live lease, for introspection (spec's `/lock/list`).
#[derive(Debug, Clone)]
pub struct LeaseView {
    pub lock_id: String,
    pub namespace: String,
    pub business_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub timeout_seconds: u64,
    pub seconds_remaining: u64,
}

struct Inner {
    primary: HashMap<Key, Lease>,
    reverse: HashMap<String, Key>,
}

impl Inner {
    fn new() -> Self {
        Self {
            primary: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Remove a lease from both indexes. Callers hold the lock already.
    fn evict(&mut self, key: &Key) {
        if let Some(lease) = self.primary.remove(key) {
            self.reverse.remove(&lease.lock_id);
        }
    }
}

/// The single-owner, reentrant, time-bounded lock registry.
///
/// Protected by one `Mutex` covering both indexes (spec §5): every public
/// method here is the entire critical section for its operation, so no
/// other registry mutation is observable mid-operation.
pub struct LockRegistry {
    config: RegistryConfig,
    inner: Mutex<Inner>,
}

impl LockRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Acquire spec §4.2.1. `namespace` defaults to `"default"`; `timeout_seconds`
    /// defaults to (and is clamped to) the configured policy.
    pub fn acquire(
        &self,
        namespace: Option<&str>,
        user_id: &str,
        user_name: Option<&str>,
        business_id: &str,
        timeout_seconds: Option<u64>,
    ) -> Result<AcquireOutcome, LockError> {
        if user_id.trim().is_empty() {
            return Err(LockError::InvalidRequest("user_id must not be empty".into()));
        }
        if business_id.trim().is_empty() {
            return Err(LockError::InvalidRequest(
                "business_id must not be empty".into(),
            ));
        }
        if let Some(t) = timeout_seconds {
            if t == 0 {
                return Err(LockError::InvalidRequest(
                    "timeout_seconds must be positive".into(),
                ));
            }
        }

        let namespace = namespace.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_NAMESPACE);
        let timeout_seconds = self
            .config
            .clamp_timeout(timeout_seconds.unwrap_or(self.config.default_timeout_secs));
        let key: Key = (namespace.to_string(), business_id.to_string());
        let now = Instant::now();

        let mut inner = self.inner.lock().expect("lock registry mutex poisoned");

        if let Some(existing) = inner.primary.get(&key) {
            if existing.is_expired(now) {
                tracing::debug!(namespace, business_id, lock_id = %existing.lock_id, "evicting expired lease on acquire");
                inner.evict(&key);
            } else if existing.user_id == user_id {
                let lock_id = existing.lock_id.clone();
                let lease = inner
                    .primary
                    .get_mut(&key)
                    .expect("lease present under lock held above");
                lease.refresh(now, Some(timeout_seconds));
                tracing::debug!(namespace, business_id, %lock_id, "reentrant acquire refreshed deadline");
                return Ok(AcquireOutcome {
                    lock_id,
                    reentrant: true,
                });
            } else {
                tracing::debug!(namespace, business_id, holder = %existing.user_id, requester = user_id, "acquire conflict");
                return Err(LockError::LockHeld {
                    namespace: namespace.to_string(),
                    business_id: business_id.to_string(),
                });
            }
        }

        let lock_id = Uuid::new_v4().to_string();
        let lease = Lease::new(
            lock_id.clone(),
            namespace.to_string(),
            business_id.to_string(),
            user_id.to_string(),
            user_name.map(|s| s.to_string()),
            timeout_seconds,
            now,
        );
        inner.reverse.insert(lock_id.clone(), key.clone());
        inner.primary.insert(key, lease);
        tracing::info!(namespace, business_id, %lock_id, user_id, "lock acquired");

        Ok(AcquireOutcome {
            lock_id,
            reentrant: false,
        })
    }

    /// Heartbeat spec §4.2.2. Refreshes the deadline using the lease's own
    /// stored `timeout_seconds`; possession of `lock_id` is the capability.
    pub fn heartbeat(&self, lock_id: &str) -> Result<(), LockError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("lock registry mutex poisoned");

        let key = match inner.reverse.get(lock_id) {
            Some(key) => key.clone(),
            None => return Err(LockError::LockNotFound(lock_id.to_string())),
        };

        let lease = match inner.primary.get(&key) {
            Some(lease) => lease,
            None => self.invariant_violation(&format!(
                "reverse index pointed at missing primary entry for lock_id {lock_id}"
            )),
        };

        if lease.lock_id != lock_id {
            // Stale reverse entry from a lease that has since been replaced.
            return Err(LockError::LockNotFound(lock_id.to_string()));
        }

        if lease.is_expired(now) {
            tracing::debug!(%lock_id, "heartbeat on expired lease, evicting");
            inner.evict(&key);
            return Err(LockError::LockNotFound(lock_id.to_string()));
        }

        let lease = inner
            .primary
            .get_mut(&key)
            .expect("lease present under lock held above");
        lease.refresh(now, None);
        tracing::debug!(%lock_id, "heartbeat refreshed deadline");
        Ok(())
    }

    /// Release spec §4.2.3. Unconditional: removes a live lease even if a
    /// separate check would first call it expired. Not idempotent — a
    /// second release of the same `lock_id` fails with `LockNotFound`.
    pub fn release(&self, lock_id: &str) -> Result<(), LockError> {
        self.release_inner(lock_id, None)
    }

    /// Operator-initiated release that bypasses no ownership check release
    /// didn't already have, but requires and audit-logs a reason
    /// (supplemental feature, see SPEC_FULL.md `[REGISTRY-EXTRA]`).
    pub fn force_release(&self, lock_id: &str, reason: &str) -> Result<(), LockError> {
        self.release_inner(lock_id, Some(reason))
    }

    fn release_inner(&self, lock_id: &str, reason: Option<&str>) -> Result<(), LockError> {
        let mut inner = self.inner.lock().expect("lock registry mutex poisoned");
        let key = match inner.reverse.remove(lock_id) {
            Some(key) => key,
            None => return Err(LockError::LockNotFound(lock_id.to_string())),
        };
        inner.primary.remove(&key);
        match reason {
            Some(reason) => tracing::warn!(%lock_id, reason, "lock force-released"),
            None => tracing::info!(%lock_id, "lock released"),
        }
        Ok(())
    }

    /// Expiration sweep (spec §4.3): remove up to `config.sweep_batch_size`
    /// expired leases. A liveness optimisation, not a correctness dependency —
    /// every other operation already honours expiry lazily. Returns the
    /// number of leases evicted.
    pub fn sweep_once(&self) -> usize {
        let now = Instant::now();
        let batch_size = self.config.sweep_batch_size;
        let mut inner = self.inner.lock().expect("lock registry mutex poisoned");

        let expired: Vec<Key> = inner
            .primary
            .iter()
            .filter(|(_, lease)| lease.is_expired(now))
            .take(batch_size)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.evict(key);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "sweeper evicted expired leases");
        }
        expired.len()
    }

    /// List live leases (spec `[REGISTRY-EXTRA]`), optionally filtered.
    pub fn list(&self, namespace: Option<&str>, user_id: Option<&str>) -> Vec<LeaseView> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("lock registry mutex poisoned");
        inner
            .primary
            .values()
            .filter(|lease| !lease.is_expired(now))
            .filter(|lease| namespace.map_or(true, |ns| lease.namespace == ns))
            .filter(|lease| user_id.map_or(true, |uid| lease.user_id == uid))
            .map(|lease| {
                let remaining = lease
                    .deadline()
                    .checked_duration_since(now)
                    .unwrap_or_default();
                LeaseView {
                    lock_id: lease.lock_id.clone(),
                    namespace: lease.namespace.clone(),
                    business_id: lease.business_id.clone(),
                    user_id: lease.user_id.clone(),
                    user_name: lease.user_name.clone(),
                    timeout_seconds: lease.timeout_seconds,
                    seconds_remaining: remaining.as_secs(),
                }
            })
            .collect()
    }

    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock().expect("lock registry mutex poisoned");
        inner
            .primary
            .values()
            .filter(|lease| !lease.is_expired(now))
            .count()
    }

    /// Invariant violations are bugs, not user errors (spec §7): log and abort.
    fn invariant_violation(&self, msg: &str) -> ! {
        tracing::error!(invariant = msg, "lock registry invariant violated");
        panic!("lock registry invariant violated: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::thread;

    fn registry() -> LockRegistry {
        LockRegistry::new(RegistryConfig::default())
    }

    #[test]
    fn basic_acquire_and_release() {
        let reg = registry();
        let acquired = reg
            .acquire(None, "test_user", None, "test_1", None)
            .unwrap();
        assert!(!acquired.reentrant);
        reg.release(&acquired.lock_id).unwrap();
    }

    #[test]
    fn cross_user_conflict_then_release_frees_it() {
        let reg = registry();
        let a = reg.acquire(None, "user_a", None, "t2", None).unwrap();
        let err = reg.acquire(None, "user_b", None, "t2", None).unwrap_err();
        assert_eq!(
            err,
            LockError::LockHeld {
                namespace: "default".into(),
                business_id: "t2".into()
            }
        );
        reg.release(&a.lock_id).unwrap();
        let b = reg.acquire(None, "user_b", None, "t2", None).unwrap();
        assert_ne!(a.lock_id, b.lock_id);
    }

    #[test]
    fn reentrancy_identity_across_three_acquires() {
        let reg = registry();
        let first = reg
            .acquire(None, "user_reentrant", None, "t11", Some(60))
            .unwrap();
        let second = reg
            .acquire(None, "user_reentrant", None, "t11", Some(60))
            .unwrap();
        let third = reg
            .acquire(None, "user_reentrant", None, "t11", Some(60))
            .unwrap();
        assert_eq!(first.lock_id, second.lock_id);
        assert_eq!(second.lock_id, third.lock_id);
        assert!(second.reentrant && third.reentrant);
        reg.release(&first.lock_id).unwrap();
    }

    #[test]
    fn heartbeat_after_release_fails() {
        let reg = registry();
        let a = reg.acquire(None, "user", None, "biz", None).unwrap();
        reg.release(&a.lock_id).unwrap();
        assert_eq!(
            reg.heartbeat(&a.lock_id).unwrap_err(),
            LockError::LockNotFound(a.lock_id)
        );
    }

    #[test]
    fn release_of_unknown_lock_id_fails_not_found() {
        let reg = registry();
        assert_eq!(
            reg.release("nonexistent").unwrap_err(),
            LockError::LockNotFound("nonexistent".into())
        );
    }

    #[test]
    fn release_is_not_idempotent() {
        let reg = registry();
        let a = reg.acquire(None, "user", None, "biz", None).unwrap();
        reg.release(&a.lock_id).unwrap();
        assert!(reg.release(&a.lock_id).is_err());
    }

    #[test]
    fn namespace_isolation() {
        let reg = registry();
        let a = reg
            .acquire(Some("a"), "user_a", None, "t7", None)
            .unwrap();
        let b = reg
            .acquire(Some("b"), "user_b", None, "t7", None)
            .unwrap();
        assert_ne!(a.lock_id, b.lock_id);
    }

    #[test]
    fn omitted_namespace_behaves_as_default() {
        let reg = registry();
        let a = reg.acquire(None, "user", None, "t9", None).unwrap();
        let err = reg
            .acquire(Some("default"), "other_user", None, "t9", None)
            .unwrap_err();
        assert!(matches!(err, LockError::LockHeld { .. }));
        reg.release(&a.lock_id).unwrap();
    }

    #[test]
    fn acquire_rejects_empty_user_id() {
        let reg = registry();
        assert!(matches!(
            reg.acquire(None, "", None, "biz", None),
            Err(LockError::InvalidRequest(_))
        ));
    }

    #[test]
    fn acquire_rejects_empty_business_id() {
        let reg = registry();
        assert!(matches!(
            reg.acquire(None, "user", None, "", None),
            Err(LockError::InvalidRequest(_))
        ));
    }

    #[test]
    fn acquire_rejects_zero_timeout() {
        let reg = registry();
        assert!(matches!(
            reg.acquire(None, "user", None, "biz", Some(0)),
            Err(LockError::InvalidRequest(_))
        ));
    }

    #[test]
    fn acquire_clamps_timeout_above_configured_max() {
        let reg = LockRegistry::new(RegistryConfig {
            max_timeout_secs: 10,
            ..RegistryConfig::default()
        });
        let a = reg
            .acquire(None, "user", None, "biz", Some(1_000_000))
            .unwrap();
        let leases = reg.list(None, None);
        let lease = leases.iter().find(|l| l.lock_id == a.lock_id).unwrap();
        assert!(lease.timeout_seconds <= 10);
    }

    #[test]
    fn sweeper_evicts_expired_without_traffic_on_that_key() {
        // Build a lease with an already-elapsed deadline by acquiring at a
        // tiny timeout and sleeping, rather than poking internals directly.
        let reg = registry();
        let a = reg.acquire(None, "user", None, "biz", Some(1)).unwrap();
        thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(reg.sweep_once(), 1);
        assert_eq!(
            reg.heartbeat(&a.lock_id).unwrap_err(),
            LockError::LockNotFound(a.lock_id)
        );
    }

    #[test]
    fn concurrent_acquire_on_same_key_exactly_one_winner_per_user() {
        let reg = Arc::new(registry());
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let successes = Arc::new(std::sync::Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                let successes = Arc::clone(&successes);
                thread::spawn(move || {
                    barrier.wait();
                    let user = format!("user_{i}");
                    if let Ok(outcome) = reg.acquire(None, &user, None, "contested", None) {
                        if !outcome.reentrant {
                            successes.lock().unwrap().push(outcome.lock_id);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        // Exactly one thread mints a fresh lock_id; the rest see LockHeld.
        assert_eq!(successes.lock().unwrap().len(), 1);
    }
}
