//! TOIL calculation engine.
//!
//! Converts a set of attendance entries plus a work schedule and a
//! holiday calendar into accrual/usage rows for a scope, and returns
//! the containing month's balance. The engine owns no state of its own:
//! it rewrites the ledger rows inside the scope on every run, which
//! makes a rerun over identical inputs produce a bit-identical summary
//! and makes a deleted entry lose its contribution on the next run.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::entry::TimeEntry;
use crate::error::CalculationError;
use crate::schedule::{HolidayCalendar, WorkSchedule};

use super::ledger::ToilLedger;
use super::types::{CalcScope, ToilRecord, ToilSummary, ToilUsage};

/// Stateless accrual/usage calculator.
#[derive(Debug, Clone)]
pub struct ToilEngine {
    toil_job_number: String,
}

impl ToilEngine {
    /// `toil_job_number` is the sentinel job code marking usage entries.
    pub fn new(toil_job_number: impl Into<String>) -> Self {
        Self {
            toil_job_number: toil_job_number.into(),
        }
    }

    pub fn toil_job_number(&self) -> &str {
        &self.toil_job_number
    }

    /// Does this entry draw down TOIL instead of accruing it?
    pub fn is_toil_entry(&self, entry: &TimeEntry) -> bool {
        entry.job_number.as_deref() == Some(self.toil_job_number.as_str())
    }

    /// Recompute the user's rows inside `scope` and return the month
    /// balance.
    ///
    /// A failure on one date (malformed schedule interval, non-finite
    /// hours) is logged and skipped; the other dates still process and
    /// the summary reflects whatever succeeded. Values stay exact
    /// floats; rounding is presentation's business.
    pub fn calculate_and_store(
        &self,
        ledger: &mut ToilLedger,
        entries: &[TimeEntry],
        scope: CalcScope,
        user_id: &str,
        schedule: &WorkSchedule,
        holidays: &HolidayCalendar,
    ) -> ToilSummary {
        let in_scope: Vec<&TimeEntry> = entries
            .iter()
            .filter(|e| e.user_id == user_id && scope.contains(e.date))
            .collect();

        let (usage_entries, regular_entries): (Vec<&TimeEntry>, Vec<&TimeEntry>) =
            in_scope.into_iter().partition(|e| self.is_toil_entry(e));

        // Usage entries consume balance; they are never worked time.
        let mut usage_rows: Vec<ToilUsage> = Vec::with_capacity(usage_entries.len());
        for entry in usage_entries {
            if !entry.hours.is_finite() {
                tracing::warn!(
                    entry_id = %entry.id,
                    error = %CalculationError::InvalidHours {
                        entry_id: entry.id.clone(),
                        value: entry.hours,
                    },
                    "skipping usage entry"
                );
                continue;
            }
            usage_rows.push(ToilUsage {
                user_id: user_id.to_string(),
                date: entry.date,
                hours_used: entry.hours,
                entry_id: entry.id.clone(),
            });
        }
        usage_rows.sort_by(|a, b| (a.date, &a.entry_id).cmp(&(b.date, &b.entry_id)));
        ledger.replace_usages_in_scope(user_id, scope, usage_rows);

        // Regular entries grouped by date; BTreeMap keeps the dates in
        // order so float summation is reproducible.
        let mut by_date: BTreeMap<NaiveDate, Vec<&TimeEntry>> = BTreeMap::new();
        for entry in regular_entries {
            by_date.entry(entry.date).or_default().push(entry);
        }

        ledger.remove_records_in_scope(user_id, scope);
        for (date, mut day_entries) in by_date {
            day_entries.sort_by(|a, b| a.id.cmp(&b.id));

            match self.accrual_for_date(date, &day_entries, schedule, holidays) {
                Ok(accrued) if accrued > 0.0 => {
                    ledger.upsert_record(ToilRecord {
                        user_id: user_id.to_string(),
                        date,
                        hours_accrued: accrued,
                        entry_ids: day_entries.iter().map(|e| e.id.clone()).collect(),
                    });
                }
                Ok(_) => {} // nothing over schedule; the pre-clear already dropped the row
                Err(e) => {
                    tracing::warn!(user = user_id, %date, error = %e, "skipping date");
                }
            }
        }

        ledger.summarize(user_id, scope.month_key())
    }

    /// Overtime for one date: worked hours beyond the scheduled hours,
    /// floored at zero. A holiday zeroes the scheduled hours so every
    /// worked hour is eligible.
    fn accrual_for_date(
        &self,
        date: NaiveDate,
        day_entries: &[&TimeEntry],
        schedule: &WorkSchedule,
        holidays: &HolidayCalendar,
    ) -> Result<f64, CalculationError> {
        let mut actual = 0.0;
        for entry in day_entries {
            if !entry.hours.is_finite() {
                return Err(CalculationError::InvalidHours {
                    entry_id: entry.id.clone(),
                    value: entry.hours,
                });
            }
            actual += entry.hours;
        }

        let scheduled = if holidays.is_holiday(date) {
            0.0
        } else {
            schedule.scheduled_hours(date)?
        };

        Ok((actual - scheduled).max(0.0))
    }
}
