use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::toil::MonthKey;

/// What prompted a queued calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    EntryCreated,
    EntryUpdated,
    EntryDeleted,
    Manual,
    Refresh,
    Regenerate,
}

/// Every observable state change in the subsystem produces an Event.
/// Subscribers receive all events and filter by user themselves.
///
/// Field names in the serialized form are part of the external contract
/// and stay camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    EntryCreated {
        entry_id: String,
        user_id: String,
        date: NaiveDate,
        #[serde(rename = "timestamp")]
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    EntryUpdated {
        entry_id: String,
        user_id: String,
        date: NaiveDate,
        #[serde(rename = "timestamp")]
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    EntryDeleted {
        entry_id: String,
        user_id: String,
        date: NaiveDate,
        #[serde(rename = "timestamp")]
        at: DateTime<Utc>,
    },
    /// Consolidated request to recalculate one user's affected months.
    /// Emitted once per user per flush, not once per trigger.
    #[serde(rename_all = "camelCase")]
    CalculationRequested {
        user_id: String,
        #[serde(rename = "monthYears")]
        months: Vec<MonthKey>,
        source: TriggerSource,
        requires_refresh: bool,
        #[serde(rename = "timestamp")]
        at: DateTime<Utc>,
    },
    /// A month balance changed; subscribers should re-read the cache.
    #[serde(rename_all = "camelCase")]
    SummaryUpdated {
        user_id: String,
        #[serde(rename = "monthYear")]
        month: MonthKey,
        accrued: f64,
        used: f64,
        remaining: f64,
        source: TriggerSource,
        #[serde(rename = "timestamp")]
        at: DateTime<Utc>,
    },
    /// A gated calculation failed; the cached summary may be stale.
    #[serde(rename_all = "camelCase")]
    CalculationFailed {
        user_id: String,
        #[serde(rename = "monthYear")]
        month: MonthKey,
        message: String,
        #[serde(rename = "timestamp")]
        at: DateTime<Utc>,
    },
}
