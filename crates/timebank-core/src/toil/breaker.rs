//! Calculation circuit breaker.
//!
//! A small gate deciding whether a calculation may run right now:
//! per-key it refuses a second concurrent run of the same
//! `(user, month)` unit, and globally it can stop every calculation at
//! once. Bypass mode is a transient override letting forced
//! regeneration run while the global stop is in effect; it is a single
//! flag, so two overlapping bypass holders can interleave (known
//! limitation).
//!
//! [`CircuitBreaker::begin`] returns an RAII [`CalculationGuard`] whose
//! `Drop` releases the key, so a run that errors out or returns early
//! can never leave the gate closed.

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::Serialize;

use super::types::CalculationKey;

#[derive(Debug, Default)]
struct BreakerState {
    in_progress: BTreeSet<CalculationKey>,
    globally_disabled: bool,
    bypass: bool,
}

/// Snapshot of the breaker's flags and busy keys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStatus {
    pub globally_disabled: bool,
    pub bypass: bool,
    pub in_progress: Vec<CalculationKey>,
}

/// Per-key gate with a global stop and a transient bypass.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// May a calculation for `key` start now?
    pub fn can_calculate(&self, key: &CalculationKey) -> bool {
        let state = self.state.lock().unwrap();
        if state.globally_disabled && !state.bypass {
            return false;
        }
        !state.in_progress.contains(key)
    }

    /// Mark `key` in progress. Returns false (and does nothing) when
    /// the gate refuses.
    pub fn start_calculation(&self, key: &CalculationKey) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.globally_disabled && !state.bypass {
            return false;
        }
        state.in_progress.insert(key.clone())
    }

    /// Release `key`. Safe to call for a key that is not in progress.
    pub fn finish_calculation(&self, key: &CalculationKey) {
        self.state.lock().unwrap().in_progress.remove(key);
    }

    /// Start `key` and get a guard that releases it on drop. `None`
    /// means the gate refused and the request should be soft-dropped.
    pub fn begin(&self, key: &CalculationKey) -> Option<CalculationGuard<'_>> {
        if self.start_calculation(key) {
            Some(CalculationGuard {
                breaker: self,
                key: key.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_in_progress(&self, key: &CalculationKey) -> bool {
        self.state.lock().unwrap().in_progress.contains(key)
    }

    /// Stop every calculation until [`resume_calculations`] is called.
    ///
    /// [`resume_calculations`]: CircuitBreaker::resume_calculations
    pub fn stop_all_calculations(&self) {
        self.state.lock().unwrap().globally_disabled = true;
        tracing::info!("calculations stopped");
    }

    pub fn resume_calculations(&self) {
        self.state.lock().unwrap().globally_disabled = false;
        tracing::info!("calculations resumed");
    }

    /// Let forced-regeneration operations run despite a global stop.
    pub fn enable_bypass_mode(&self) {
        self.state.lock().unwrap().bypass = true;
    }

    pub fn disable_bypass_mode(&self) {
        self.state.lock().unwrap().bypass = false;
    }

    pub fn is_globally_disabled(&self) -> bool {
        self.state.lock().unwrap().globally_disabled
    }

    pub fn is_bypass_active(&self) -> bool {
        self.state.lock().unwrap().bypass
    }

    pub fn status(&self) -> BreakerStatus {
        let state = self.state.lock().unwrap();
        BreakerStatus {
            globally_disabled: state.globally_disabled,
            bypass: state.bypass,
            in_progress: state.in_progress.iter().cloned().collect(),
        }
    }
}

/// Releases its key when dropped, whatever the exit path.
#[derive(Debug)]
pub struct CalculationGuard<'a> {
    breaker: &'a CircuitBreaker,
    key: CalculationKey,
}

impl CalculationGuard<'_> {
    pub fn key(&self) -> &CalculationKey {
        &self.key
    }
}

impl Drop for CalculationGuard<'_> {
    fn drop(&mut self) {
        self.breaker.finish_calculation(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toil::MonthKey;

    fn key(user: &str) -> CalculationKey {
        CalculationKey::new(user, MonthKey::new(2025, 6).unwrap())
    }

    #[test]
    fn test_second_start_for_same_key_rejected() {
        let breaker = CircuitBreaker::new();
        let k = key("u1");

        assert!(breaker.start_calculation(&k));
        assert!(!breaker.can_calculate(&k));
        assert!(!breaker.start_calculation(&k));

        // A different key is unaffected.
        assert!(breaker.can_calculate(&key("u2")));

        breaker.finish_calculation(&k);
        assert!(breaker.can_calculate(&k));
    }

    #[test]
    fn test_global_stop_blocks_every_key() {
        let breaker = CircuitBreaker::new();
        breaker.stop_all_calculations();

        assert!(!breaker.can_calculate(&key("u1")));
        assert!(!breaker.can_calculate(&key("u2")));
        assert!(!breaker.start_calculation(&key("u1")));

        breaker.resume_calculations();
        assert!(breaker.can_calculate(&key("u1")));
    }

    #[test]
    fn test_bypass_overrides_global_stop() {
        let breaker = CircuitBreaker::new();
        breaker.stop_all_calculations();
        breaker.enable_bypass_mode();

        assert!(breaker.can_calculate(&key("u1")));
        let guard = breaker.begin(&key("u1"));
        assert!(guard.is_some());

        // Bypass does not override the per-key gate.
        assert!(!breaker.can_calculate(&key("u1")));

        drop(guard);
        breaker.disable_bypass_mode();
        assert!(!breaker.can_calculate(&key("u1")));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let breaker = CircuitBreaker::new();
        let k = key("u1");
        {
            let _guard = breaker.begin(&k).unwrap();
            assert!(breaker.is_in_progress(&k));
            assert!(breaker.begin(&k).is_none());
        }
        assert!(!breaker.is_in_progress(&k));
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let breaker = CircuitBreaker::new();
        let k = key("u1");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = breaker.begin(&k).unwrap();
            panic!("calculation blew up");
        }));
        assert!(result.is_err());
        assert!(!breaker.is_in_progress(&k));
        assert!(breaker.can_calculate(&k));
    }

    #[test]
    fn test_status_snapshot() {
        let breaker = CircuitBreaker::new();
        let _guard = breaker.begin(&key("u1")).unwrap();
        breaker.stop_all_calculations();

        let status = breaker.status();
        assert!(status.globally_disabled);
        assert!(!status.bypass);
        assert_eq!(status.in_progress, vec![key("u1")]);
    }
}
