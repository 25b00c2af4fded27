//! Per-(user, month) summary cache.
//!
//! Holds the last computed [`ToilSummary`] per key. Invalidation is
//! explicit, never timer-driven. Forced refreshes are rate-limited per
//! key so a refresh button or a noisy upstream event cannot re-trigger
//! the engine faster than it can complete.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::types::{CalculationKey, ToilSummary};

#[derive(Debug, Default)]
struct CacheState {
    summaries: HashMap<CalculationKey, ToilSummary>,
    last_refresh: HashMap<CalculationKey, DateTime<Utc>>,
}

/// Last-known summaries plus forced-refresh bookkeeping.
#[derive(Debug)]
pub struct SummaryCache {
    min_refresh_gap: Duration,
    state: Mutex<CacheState>,
}

impl SummaryCache {
    /// `min_refresh_gap` is the smallest allowed gap between two forced
    /// refreshes of the same key.
    pub fn new(min_refresh_gap: Duration) -> Self {
        Self {
            min_refresh_gap,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn get(&self, key: &CalculationKey) -> Option<ToilSummary> {
        self.state.lock().unwrap().summaries.get(key).cloned()
    }

    /// Store the latest summary for its own key.
    pub fn put(&self, summary: ToilSummary) {
        let key = summary.key();
        self.state.lock().unwrap().summaries.insert(key, summary);
    }

    /// Drop one key. Returns false when it was not cached.
    pub fn invalidate(&self, key: &CalculationKey) -> bool {
        self.state.lock().unwrap().summaries.remove(key).is_some()
    }

    /// Drop every cached summary for one user. Returns the number
    /// dropped.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        let before = state.summaries.len();
        state.summaries.retain(|key, _| key.user_id != user_id);
        before - state.summaries.len()
    }

    /// Cached keys for one user, ascending by month.
    pub fn keys_for_user(&self, user_id: &str) -> Vec<CalculationKey> {
        let state = self.state.lock().unwrap();
        let mut keys: Vec<CalculationKey> = state
            .summaries
            .keys()
            .filter(|key| key.user_id == user_id)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// May a forced refresh for `key` run at `now`? Records `now` as
    /// the refresh instant when it may.
    pub fn try_begin_refresh(&self, key: &CalculationKey, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().unwrap();
        if let Some(last) = state.last_refresh.get(key) {
            if now - *last < self.min_refresh_gap {
                return false;
            }
        }
        state.last_refresh.insert(key.clone(), now);
        true
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.summaries.clear();
        state.last_refresh.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().summaries.is_empty()
    }
}
