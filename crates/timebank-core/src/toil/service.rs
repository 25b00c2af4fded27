//! TOIL service facade.
//!
//! One explicit service object wiring the store, engine, breaker,
//! cache, coordinator and bus together. Nothing here is a module-level
//! singleton: every collaborator is injected at construction, so tests
//! build as many independent services as they like and drive time
//! through a [`Clock`].
//!
//! The pipeline: an entry mutation queues a calculation trigger; once
//! the debounce window elapses, [`tick`] flushes the coordinator, runs
//! each batched month behind the circuit breaker, stores the result in
//! the ledger and cache, and queues a summary update that a later flush
//! publishes. Bus publishes always happen with no internal locks held,
//! so subscribers may call back into the service.
//!
//! [`tick`]: ToilService::tick

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::bus::NotificationBus;
use crate::clock::Clock;
use crate::entry::{EntryPatch, EntryStore, NewEntry, TimeEntry};
use crate::error::{CalculationError, StoreError};
use crate::events::{Event, TriggerSource};
use crate::schedule::{HolidayCalendar, WorkSchedule};

use super::breaker::{BreakerStatus, CircuitBreaker};
use super::cache::SummaryCache;
use super::coordinator::{CoordinatorSettings, EventCoordinator, FlushOutcome, QueueOutcome};
use super::engine::ToilEngine;
use super::ledger::ToilLedger;
use super::types::{CalcScope, CalculationKey, MonthKey, ToilSummary};

/// Service tunables, usually derived from [`Config`].
///
/// [`Config`]: crate::storage::Config
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Job code marking TOIL-usage entries.
    pub toil_job_number: String,
    pub coordinator: CoordinatorSettings,
    /// Minimum gap between forced refreshes of one key.
    pub min_refresh_gap_ms: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            toil_job_number: "TOIL".to_string(),
            coordinator: CoordinatorSettings::default(),
            min_refresh_gap_ms: 250,
        }
    }
}

/// The public surface of the TOIL subsystem.
pub struct ToilService {
    store: Arc<EntryStore>,
    bus: Arc<NotificationBus>,
    clock: Arc<dyn Clock>,
    engine: ToilEngine,
    breaker: CircuitBreaker,
    cache: SummaryCache,
    coordinator: Mutex<EventCoordinator>,
    ledger: Mutex<ToilLedger>,
    schedule: RwLock<Option<WorkSchedule>>,
    holidays: RwLock<HolidayCalendar>,
    last_errors: Mutex<HashMap<CalculationKey, String>>,
}

impl ToilService {
    pub fn new(
        store: Arc<EntryStore>,
        bus: Arc<NotificationBus>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            engine: ToilEngine::new(settings.toil_job_number),
            breaker: CircuitBreaker::new(),
            cache: SummaryCache::new(Duration::milliseconds(
                settings.min_refresh_gap_ms.max(0),
            )),
            coordinator: Mutex::new(EventCoordinator::new(settings.coordinator)),
            ledger: Mutex::new(ToilLedger::new()),
            schedule: RwLock::new(None),
            holidays: RwLock::new(HolidayCalendar::new()),
            last_errors: Mutex::new(HashMap::new()),
            store,
            bus,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    // ── Upstream data ────────────────────────────────────────────────

    pub fn set_schedule(&self, schedule: Option<WorkSchedule>) {
        *self.schedule.write().unwrap() = schedule;
    }

    pub fn schedule(&self) -> Option<WorkSchedule> {
        self.schedule.read().unwrap().clone()
    }

    pub fn set_holidays(&self, holidays: HolidayCalendar) {
        *self.holidays.write().unwrap() = holidays;
    }

    pub fn holidays(&self) -> HolidayCalendar {
        self.holidays.read().unwrap().clone()
    }

    /// Does this entry draw down TOIL instead of accruing it?
    pub fn is_toil_entry(&self, entry: &TimeEntry) -> bool {
        self.engine.is_toil_entry(entry)
    }

    // ── Entry CRUD (queues calculation triggers on success) ──────────

    pub async fn create_entry(&self, new: NewEntry) -> Result<String, StoreError> {
        let user_id = new.user_id.clone();
        let date = new.date;
        let id = self.store.create_entry(new).await?;
        self.queue_for_date(&user_id, date, TriggerSource::EntryCreated);
        Ok(id)
    }

    /// Applies the patch and queues triggers for the affected months —
    /// both the old and the new month when a date change moved the
    /// entry across a boundary.
    pub async fn update_entry(&self, id: &str, patch: EntryPatch) -> Result<bool, StoreError> {
        let before = self.store.get_entry(id);
        let updated = self.store.update_entry(id, patch).await?;
        if updated {
            if let Some(after) = self.store.get_entry(id) {
                self.queue_for_date(&after.user_id, after.date, TriggerSource::EntryUpdated);
                if let Some(before) = before {
                    if MonthKey::from_date(before.date) != MonthKey::from_date(after.date) {
                        self.queue_for_date(
                            &before.user_id,
                            before.date,
                            TriggerSource::EntryUpdated,
                        );
                    }
                }
            }
        }
        Ok(updated)
    }

    pub async fn delete_entry(&self, id: &str) -> Result<bool, StoreError> {
        let entry = self.store.get_entry(id);
        let deleted = self.store.delete_entry(id).await?;
        if deleted {
            if let Some(entry) = entry {
                self.queue_for_date(&entry.user_id, entry.date, TriggerSource::EntryDeleted);
            }
        }
        Ok(deleted)
    }

    /// Bulk delete, then forced regeneration of the user's months.
    /// Returns the number of entries removed.
    pub async fn delete_user_entries(&self, user_id: &str) -> Result<usize, StoreError> {
        let removed = self.store.delete_user_entries(user_id).await?;
        if !removed.is_empty() {
            self.regenerate(user_id);
        }
        Ok(removed.len())
    }

    // ── Summaries ────────────────────────────────────────────────────

    /// Cached summary, computing synchronously on a miss. Falls back to
    /// an all-zero summary when the calculation is gated out or fails.
    pub fn summary(&self, user_id: &str, month: MonthKey) -> ToilSummary {
        let key = CalculationKey::new(user_id, month);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        self.run_scope(&key, CalcScope::Month(month))
            .unwrap_or_else(|| ToilSummary::zero(user_id, month))
    }

    /// Forced recompute, rate-limited per key. A rate-limited or failed
    /// refresh returns the cached (or zero) summary instead.
    pub fn refresh_summary(&self, user_id: &str, month: MonthKey) -> ToilSummary {
        let key = CalculationKey::new(user_id, month);
        if !self.cache.try_begin_refresh(&key, self.clock.now()) {
            tracing::debug!(%key, "forced refresh rate-limited");
            return self.cached_or_zero(&key);
        }
        match self.run_scope(&key, CalcScope::Month(month)) {
            Some(summary) => {
                let now = self.clock.now();
                self.coordinator.lock().unwrap().queue_summary_update(
                    summary.clone(),
                    TriggerSource::Refresh,
                    now,
                );
                summary
            }
            None => self.cached_or_zero(&key),
        }
    }

    /// Reprocess a single day. `None` when the breaker refused or the
    /// run failed; the returned summary still covers the whole month.
    pub fn calculate_toil_for_day(&self, user_id: &str, date: NaiveDate) -> Option<ToilSummary> {
        let key = CalculationKey::for_date(user_id, date);
        self.run_scope(&key, CalcScope::Day(date))
    }

    /// Queue a calculation trigger through the coordinator.
    pub fn trigger_toil_calculation(
        &self,
        user_id: &str,
        month: MonthKey,
        source: TriggerSource,
    ) -> QueueOutcome {
        let now = self.clock.now();
        self.coordinator.lock().unwrap().queue_calculation(
            user_id,
            month.first_day(),
            month,
            source,
            now,
        )
    }

    /// Recompute every month the user has entries, ledger rows or
    /// cached summaries in, under bypass mode so the rebuild proceeds
    /// even while calculations are globally stopped.
    pub fn regenerate(&self, user_id: &str) -> Vec<ToilSummary> {
        let mut months: BTreeSet<MonthKey> = self
            .store
            .get_user_entries(user_id)
            .iter()
            .map(|e| MonthKey::from_date(e.date))
            .collect();
        months.extend(self.ledger.lock().unwrap().months_for_user(user_id));
        months.extend(self.cache.keys_for_user(user_id).into_iter().map(|k| k.month));

        tracing::info!(user = user_id, months = months.len(), "regenerating");
        self.breaker.enable_bypass_mode();
        let mut summaries = Vec::with_capacity(months.len());
        for month in months {
            let key = CalculationKey::new(user_id, month);
            if let Some(summary) = self.run_scope(&key, CalcScope::Month(month)) {
                let now = self.clock.now();
                self.coordinator.lock().unwrap().queue_summary_update(
                    summary.clone(),
                    TriggerSource::Regenerate,
                    now,
                );
                summaries.push(summary);
            }
        }
        self.breaker.disable_bypass_mode();
        summaries
    }

    // ── Coordinator pump ─────────────────────────────────────────────

    /// Advance the coordinator; if its deadline has passed, execute the
    /// flushed batches and publish their events. Returns the number of
    /// events published.
    pub fn tick(&self) -> usize {
        let now = self.clock.now();
        let outcome = self.coordinator.lock().unwrap().tick(now);
        match outcome {
            Some(outcome) => self.execute(outcome),
            None => 0,
        }
    }

    /// Flush the coordinator regardless of its deadline.
    pub fn flush(&self) -> usize {
        let now = self.clock.now();
        let outcome = self.coordinator.lock().unwrap().flush_immediate(now);
        self.execute(outcome)
    }

    /// Flush repeatedly until nothing is pending — calculation batches
    /// queue summary updates, which need a second flush to go out. Used
    /// for deterministic shutdown.
    pub fn drain(&self) -> usize {
        let mut published = 0;
        loop {
            let now = self.clock.now();
            let outcome = self.coordinator.lock().unwrap().flush_immediate(now);
            if outcome.is_empty() && outcome.remaining == 0 {
                break;
            }
            published += self.execute(outcome);
        }
        published
    }

    pub fn next_flush_deadline(&self) -> Option<DateTime<Utc>> {
        self.coordinator.lock().unwrap().next_flush_deadline()
    }

    pub fn pending_triggers(&self) -> usize {
        self.coordinator.lock().unwrap().pending_len()
    }

    /// Cancel all pending triggers and recency bookkeeping.
    pub fn clear_pending(&self) {
        self.coordinator.lock().unwrap().clear();
    }

    // ── Breaker surface ──────────────────────────────────────────────

    pub fn stop_calculations(&self) {
        self.breaker.stop_all_calculations();
    }

    pub fn resume_calculations(&self) {
        self.breaker.resume_calculations();
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    pub fn is_calculating(&self, user_id: &str, month: MonthKey) -> bool {
        self.breaker
            .is_in_progress(&CalculationKey::new(user_id, month))
    }

    /// Message from the most recent failed calculation for the key,
    /// cleared by the next successful run.
    pub fn last_error(&self, user_id: &str, month: MonthKey) -> Option<String> {
        self.last_errors
            .lock()
            .unwrap()
            .get(&CalculationKey::new(user_id, month))
            .cloned()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn queue_for_date(&self, user_id: &str, date: NaiveDate, source: TriggerSource) {
        let now = self.clock.now();
        self.coordinator.lock().unwrap().queue_calculation(
            user_id,
            date,
            MonthKey::from_date(date),
            source,
            now,
        );
    }

    fn cached_or_zero(&self, key: &CalculationKey) -> ToilSummary {
        self.cache
            .get(key)
            .unwrap_or_else(|| ToilSummary::zero(key.user_id.clone(), key.month))
    }

    /// Run the engine for one key behind the circuit breaker. `None`
    /// means the request was soft-dropped (gated) or failed; failures
    /// are recorded and published, and the breaker is always released.
    fn run_scope(&self, key: &CalculationKey, scope: CalcScope) -> Option<ToilSummary> {
        let guard = match self.breaker.begin(key) {
            Some(guard) => guard,
            None => {
                tracing::debug!(%key, "calculation gated; request dropped");
                return None;
            }
        };

        let schedule = self.schedule.read().unwrap().clone();
        let Some(schedule) = schedule else {
            drop(guard);
            self.record_failure(key, CalculationError::MissingSchedule.to_string());
            return None;
        };
        let holidays = self.holidays.read().unwrap().clone();
        let entries = self
            .store
            .get_month_entries(key.month.first_day(), &key.user_id);

        let summary = {
            let mut ledger = self.ledger.lock().unwrap();
            self.engine.calculate_and_store(
                &mut ledger,
                &entries,
                scope,
                &key.user_id,
                &schedule,
                &holidays,
            )
        };
        self.cache.put(summary.clone());
        self.last_errors.lock().unwrap().remove(key);
        drop(guard);
        Some(summary)
    }

    fn record_failure(&self, key: &CalculationKey, message: String) {
        tracing::warn!(%key, %message, "calculation failed");
        self.last_errors
            .lock()
            .unwrap()
            .insert(key.clone(), message.clone());
        self.bus.publish(&Event::CalculationFailed {
            user_id: key.user_id.clone(),
            month: key.month,
            message,
            at: self.clock.now(),
        });
    }

    /// Publish and run everything one flush released. Calculation
    /// batches run month by month behind the breaker and queue a
    /// summary update for each success.
    fn execute(&self, outcome: FlushOutcome) -> usize {
        let mut published = 0;

        for batch in outcome.batches {
            self.bus.publish(&Event::CalculationRequested {
                user_id: batch.user_id.clone(),
                months: batch.months.clone(),
                source: batch.source,
                requires_refresh: batch.requires_refresh,
                at: self.clock.now(),
            });
            published += 1;

            for month in batch.months {
                let key = CalculationKey::new(batch.user_id.clone(), month);
                if let Some(summary) = self.run_scope(&key, CalcScope::Month(month)) {
                    let now = self.clock.now();
                    self.coordinator.lock().unwrap().queue_summary_update(
                        summary,
                        batch.source,
                        now,
                    );
                }
            }
        }

        for update in outcome.summaries {
            let summary = update.summary;
            self.bus.publish(&Event::SummaryUpdated {
                user_id: summary.user_id.clone(),
                month: summary.month,
                accrued: summary.accrued,
                used: summary.used,
                remaining: summary.remaining,
                source: update.source,
                at: self.clock.now(),
            });
            published += 1;
        }

        published
    }
}
