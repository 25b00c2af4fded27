//! Attendance entries and the persisted entry ledger.

mod retry;
mod store;

pub use retry::RetryPolicy;
pub use store::{EntryStore, ENTRIES_KEY, TOMBSTONES_KEY};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Review status of a time entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Submitted,
    Approved,
}

impl Default for EntryStatus {
    fn default() -> Self {
        EntryStatus::Draft
    }
}

/// A single attendance record.
///
/// Owned by the [`EntryStore`]; mutate through its CRUD operations only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Unique id (UUID v4).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Day the hours were worked.
    pub date: NaiveDate,
    /// Worked hours (finite, > 0).
    pub hours: f64,
    /// Job/cost code. The configured TOIL code marks a usage entry.
    #[serde(default)]
    pub job_number: Option<String>,
    /// Review status.
    #[serde(default)]
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating an entry. The store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub user_id: String,
    pub date: NaiveDate,
    pub hours: f64,
    #[serde(default)]
    pub job_number: Option<String>,
    #[serde(default)]
    pub status: EntryStatus,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub date: Option<NaiveDate>,
    pub hours: Option<f64>,
    /// `Some(None)` clears the job code.
    pub job_number: Option<Option<String>>,
    pub status: Option<EntryStatus>,
}

pub(crate) fn validate_hours(hours: f64) -> Result<(), ValidationError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(ValidationError::InvalidHours { value: hours });
    }
    Ok(())
}
