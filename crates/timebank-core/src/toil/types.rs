//! Core TOIL data types.
//!
//! `(user, month)` — the [`CalculationKey`] — is the unit of caching,
//! gating and deduplication throughout the subsystem, so the types here
//! are ordered and hashable to serve as map keys everywhere.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month, serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid month key '{s}' (expected YYYY-MM)"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in month key '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in month key '{s}'"))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// The unit of concurrency control, caching and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalculationKey {
    pub user_id: String,
    pub month: MonthKey,
}

impl CalculationKey {
    pub fn new(user_id: impl Into<String>, month: MonthKey) -> Self {
        Self {
            user_id: user_id.into(),
            month,
        }
    }

    pub fn for_date(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(user_id, MonthKey::from_date(date))
    }
}

impl fmt::Display for CalculationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.month)
    }
}

/// What the engine is asked to reprocess: one day or a whole month.
/// Either way the resulting summary covers the containing month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcScope {
    Day(NaiveDate),
    Month(MonthKey),
}

impl CalcScope {
    pub fn month_key(&self) -> MonthKey {
        match self {
            CalcScope::Day(date) => MonthKey::from_date(*date),
            CalcScope::Month(month) => *month,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            CalcScope::Day(day) => *day == date,
            CalcScope::Month(month) => month.contains(date),
        }
    }
}

/// Accrued overtime for one user on one date.
///
/// Keyed in the ledger by (user, date); recomputation overwrites the
/// row, so `entry_ids` always reflects the latest contributing entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToilRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub hours_accrued: f64,
    /// Contributing entry ids, sorted.
    pub entry_ids: Vec<String>,
}

/// Balance drawn down by one TOIL-usage entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToilUsage {
    pub user_id: String,
    pub date: NaiveDate,
    pub hours_used: f64,
    pub entry_id: String,
}

/// Derived month balance. Cached, never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToilSummary {
    pub user_id: String,
    #[serde(rename = "monthYear")]
    pub month: MonthKey,
    pub accrued: f64,
    pub used: f64,
    pub remaining: f64,
}

impl ToilSummary {
    /// All-zero summary, the consumer-facing fallback when a
    /// calculation is gated out or fails.
    pub fn zero(user_id: impl Into<String>, month: MonthKey) -> Self {
        Self {
            user_id: user_id.into(),
            month,
            accrued: 0.0,
            used: 0.0,
            remaining: 0.0,
        }
    }

    pub fn key(&self) -> CalculationKey {
        CalculationKey::new(self.user_id.clone(), self.month)
    }
}
