//! Spawn policy for stitch workers
//!
//! Every accepted submission gets its own task. By default nothing limits how
//! many of them run the tool at once; a bounded policy only makes workers
//! wait for a slot. It never rejects, cancels or retries a job.

use crate::config::StitchConfig;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// How many tool invocations may run at the same time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPolicy {
    /// One task per submission, no limit
    Unbounded,
    /// At most this many tool invocations at once (always >= 1)
    Bounded(usize),
}

impl Default for SpawnPolicy {
    fn default() -> Self {
        Self::Unbounded
    }
}

impl SpawnPolicy {
    /// Derive the policy from configuration
    ///
    /// `max_concurrent_jobs = 0` means unbounded.
    pub fn from_config(cfg: &StitchConfig) -> Self {
        match cfg.max_concurrent_jobs {
            0 => SpawnPolicy::Unbounded,
            n => SpawnPolicy::Bounded(n as usize),
        }
    }

    /// Semaphore enforcing the policy, if it is bounded
    pub fn limiter(&self) -> Option<Arc<Semaphore>> {
        match self {
            SpawnPolicy::Unbounded => None,
            SpawnPolicy::Bounded(n) => Some(Arc::new(Semaphore::new((*n).max(1)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_policy_is_unbounded() {
        assert_eq!(SpawnPolicy::default(), SpawnPolicy::Unbounded);
        assert_eq!(
            SpawnPolicy::from_config(&StitchConfig::default()),
            SpawnPolicy::Unbounded
        );
        assert!(SpawnPolicy::Unbounded.limiter().is_none());
    }

    #[test]
    fn test_bounded_zero_still_gets_one_slot() {
        let limiter = SpawnPolicy::Bounded(0).limiter().unwrap();
        assert_eq!(limiter.available_permits(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_bounded_policy_matches_config(max_jobs in 1u32..64) {
            let cfg = StitchConfig {
                max_concurrent_jobs: max_jobs,
                ..StitchConfig::default()
            };

            let policy = SpawnPolicy::from_config(&cfg);
            prop_assert_eq!(policy, SpawnPolicy::Bounded(max_jobs as usize));

            let limiter = policy.limiter().unwrap();
            prop_assert_eq!(limiter.available_permits(), max_jobs as usize);
        }
    }
}
