//! Registry policy knobs, set at process start and immutable thereafter.
//!
//! The server binary parses these from CLI flags / env vars (see
//! `lockd-server`'s `Args`) and passes a `RegistryConfig` into
//! [`crate::registry::LockRegistry::new`].

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Used when an acquire request omits `timeout_seconds`.
    pub default_timeout_secs: u64,
    /// Requests above this are clamped down, not rejected (spec §6).
    pub max_timeout_secs: u64,
    /// How often the sweeper scans for expired leases.
    pub sweep_interval_secs: u64,
    /// Upper bound on leases removed per sweep batch (spec §4.3).
    pub sweep_batch_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60,
            max_timeout_secs: 3600,
            sweep_interval_secs: 1,
            sweep_batch_size: 256,
        }
    }
}

impl RegistryConfig {
    /// Clamp a client-supplied timeout to `max_timeout_secs`, logging if clamped.
    pub fn clamp_timeout(&self, requested: u64) -> u64 {
        if requested > self.max_timeout_secs {
            tracing::warn!(
                requested,
                max = self.max_timeout_secs,
                "clamping acquire timeout to configured maximum"
            );
            self.max_timeout_secs
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_policy_matches_documented_values() {
        let config = RegistryConfig::default();
        assert_eq!(config.default_timeout_secs, 60);
        assert_eq!(config.max_timeout_secs, 3600);
        assert_eq!(config.sweep_interval_secs, 1);
        assert_eq!(config.sweep_batch_size, 256);
    }

    proptest! {
        #[test]
        fn clamp_never_exceeds_configured_max(requested in 0u64..=u64::MAX, max in 1u64..=1_000_000u64) {
            let config = RegistryConfig { max_timeout_secs: max, ..RegistryConfig::default() };
            prop_assert!(config.clamp_timeout(requested) <= max);
        }

        #[test]
        fn clamp_is_identity_below_max(requested in 0u64..=1_000_000u64, max in 1_000_001u64..=2_000_000u64) {
            let config = RegistryConfig { max_timeout_secs: max, ..RegistryConfig::default() };
            prop_assert_eq!(config.clamp_timeout(requested), requested);
        }
    }
}
