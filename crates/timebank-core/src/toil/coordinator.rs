//! Event coordinator: dedup, debounce and batch.
//!
//! Calculation and summary-update triggers arrive far faster than
//! anyone wants them delivered, so the coordinator drops repeats seen
//! within the dedup window, collects survivors keyed by
//! `(user, month)`, and releases them as one batch once the debounce
//! window has passed. It is a pure state machine: the caller advances
//! it with `tick(now)` and executes the returned [`FlushOutcome`]
//! itself, so tests drive it with a virtual clock and the coordinator
//! never touches a timer or the bus.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::events::TriggerSource;

use super::types::{CalculationKey, MonthKey, ToilSummary};

/// Coordinator tunables (milliseconds; clamped by [`normalized`]).
///
/// [`normalized`]: CoordinatorSettings::normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Quiet period between the first enqueue and the flush.
    pub debounce_window_ms: i64,
    /// A trigger whose key was queued or delivered within this window
    /// is dropped.
    pub dedup_window_ms: i64,
    /// Most distinct keys released per flush.
    pub max_batch: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            debounce_window_ms: 500,
            dedup_window_ms: 1000,
            max_batch: 10,
        }
    }
}

impl CoordinatorSettings {
    /// Clamp to workable values: windows non-negative, batch at least 1.
    pub fn normalized(self) -> Self {
        Self {
            debounce_window_ms: self.debounce_window_ms.max(0),
            dedup_window_ms: self.dedup_window_ms.max(0),
            max_batch: self.max_batch.max(1),
        }
    }
}

/// What became of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    /// Same key seen within the dedup window; the call was dropped.
    DroppedDuplicate,
}

/// Consolidated calculation request: one per user per flush, listing
/// every affected month.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationBatch {
    pub user_id: String,
    pub months: Vec<MonthKey>,
    pub source: TriggerSource,
    pub requires_refresh: bool,
}

/// One summary-update delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryUpdate {
    pub summary: ToilSummary,
    pub source: TriggerSource,
}

/// Everything one flush released. The caller publishes/executes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushOutcome {
    pub batches: Vec<CalculationBatch>,
    pub summaries: Vec<SummaryUpdate>,
    /// Keys beyond the batch cap, still pending.
    pub remaining: usize,
}

impl FlushOutcome {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.summaries.is_empty()
    }
}

/// Dedup tracks the two trigger kinds separately: a summary update
/// emitted as the direct consequence of a calculation trigger must not
/// be deduplicated against that trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TriggerKind {
    Calculation,
    Summary,
}

#[derive(Debug, Clone)]
enum PendingTrigger {
    Calculation {
        user_id: String,
        month: MonthKey,
        source: TriggerSource,
    },
    Summary {
        summary: ToilSummary,
        source: TriggerSource,
    },
}

/// Debounce-and-collect queue over calculation/summary triggers.
#[derive(Debug)]
pub struct EventCoordinator {
    settings: CoordinatorSettings,
    debounce: Duration,
    dedup: Duration,
    /// One slot per (kind, key), in insertion order.
    pending: IndexMap<(TriggerKind, CalculationKey), PendingTrigger>,
    /// Last queued-or-delivered instant per (kind, key).
    recency: HashMap<(TriggerKind, CalculationKey), DateTime<Utc>>,
    flush_at: Option<DateTime<Utc>>,
}

impl EventCoordinator {
    pub fn new(settings: CoordinatorSettings) -> Self {
        let settings = settings.normalized();
        Self {
            settings,
            debounce: Duration::milliseconds(settings.debounce_window_ms),
            dedup: Duration::milliseconds(settings.dedup_window_ms),
            pending: IndexMap::new(),
            recency: HashMap::new(),
            flush_at: None,
        }
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.settings
    }

    /// Ask for the user's month to be recalculated. `date` is the day
    /// whose entries changed.
    pub fn queue_calculation(
        &mut self,
        user_id: &str,
        date: NaiveDate,
        month: MonthKey,
        source: TriggerSource,
        now: DateTime<Utc>,
    ) -> QueueOutcome {
        let key = CalculationKey::new(user_id, month);
        tracing::trace!(user = user_id, %date, %month, ?source, "calculation trigger");
        self.enqueue(
            TriggerKind::Calculation,
            key,
            PendingTrigger::Calculation {
                user_id: user_id.to_string(),
                month,
                source,
            },
            now,
        )
    }

    /// Announce a freshly computed summary to subscribers.
    pub fn queue_summary_update(
        &mut self,
        summary: ToilSummary,
        source: TriggerSource,
        now: DateTime<Utc>,
    ) -> QueueOutcome {
        let key = summary.key();
        self.enqueue(
            TriggerKind::Summary,
            key,
            PendingTrigger::Summary { summary, source },
            now,
        )
    }

    fn enqueue(
        &mut self,
        kind: TriggerKind,
        key: CalculationKey,
        trigger: PendingTrigger,
        now: DateTime<Utc>,
    ) -> QueueOutcome {
        let slot = (kind, key);
        if let Some(last) = self.recency.get(&slot) {
            if now - *last < self.dedup {
                tracing::trace!(key = %slot.1, "duplicate trigger dropped");
                return QueueOutcome::DroppedDuplicate;
            }
        }
        self.recency.insert(slot.clone(), now);
        self.pending.insert(slot, trigger);

        // The first enqueue of a cycle arms the deadline; later ones
        // do not extend it.
        if self.flush_at.is_none() {
            self.flush_at = Some(now + self.debounce);
        }
        QueueOutcome::Queued
    }

    /// When the pending cycle will flush, if one is armed.
    pub fn next_flush_deadline(&self) -> Option<DateTime<Utc>> {
        self.flush_at
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flush if the armed deadline has passed. `None` when there is
    /// nothing to do yet.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<FlushOutcome> {
        match self.flush_at {
            Some(deadline) if now >= deadline => Some(self.flush(now)),
            _ => None,
        }
    }

    /// Flush now, deadline or not. Used for deterministic shutdown.
    pub fn flush_immediate(&mut self, now: DateTime<Utc>) -> FlushOutcome {
        self.flush(now)
    }

    fn flush(&mut self, now: DateTime<Utc>) -> FlushOutcome {
        self.recency.retain(|_, last| now - *last < self.dedup);

        let take = self.settings.max_batch.min(self.pending.len());
        let mut calc_by_user: IndexMap<String, CalculationBatch> = IndexMap::new();
        let mut summaries = Vec::new();

        // drain(..take) releases the oldest keys first; IndexMap keeps
        // insertion order, so the cap is FIFO.
        for (slot, trigger) in self.pending.drain(..take) {
            self.recency.insert(slot, now);
            match trigger {
                PendingTrigger::Calculation {
                    user_id,
                    month,
                    source,
                } => {
                    let batch =
                        calc_by_user
                            .entry(user_id.clone())
                            .or_insert_with(|| CalculationBatch {
                                user_id,
                                months: Vec::new(),
                                source,
                                requires_refresh: true,
                            });
                    if !batch.months.contains(&month) {
                        batch.months.push(month);
                    }
                }
                PendingTrigger::Summary { summary, source } => {
                    summaries.push(SummaryUpdate { summary, source });
                }
            }
        }

        let batches: Vec<CalculationBatch> = calc_by_user
            .into_values()
            .map(|mut batch| {
                batch.months.sort();
                batch
            })
            .collect();

        let remaining = self.pending.len();
        self.flush_at = if remaining > 0 {
            // Overflow keys wait for the next window.
            Some(now + self.debounce)
        } else {
            None
        };

        tracing::debug!(
            batches = batches.len(),
            summaries = summaries.len(),
            remaining,
            "coordinator flushed"
        );
        FlushOutcome {
            batches,
            summaries,
            remaining,
        }
    }

    /// Cancel the pending cycle and forget all recency bookkeeping.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.recency.clear();
        self.flush_at = None;
    }
}

impl Default for EventCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorSettings::default())
    }
}
