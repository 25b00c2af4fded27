//! In-memory ledger of accrual and usage rows.
//!
//! The ledger is derived state: the engine rebuilds the rows inside a
//! scope from the entry set on every run, so rows are replaced rather
//! than appended and a rerun over identical inputs leaves the ledger
//! bit-identical. Accrual rows are keyed by (user, date); usage rows by
//! the entry id that consumed the balance.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::types::{CalcScope, MonthKey, ToilRecord, ToilSummary, ToilUsage};

/// Accrual/usage rows for every user, keyed for replacement.
#[derive(Debug, Default)]
pub struct ToilLedger {
    records: HashMap<(String, NaiveDate), ToilRecord>,
    usages: HashMap<String, ToilUsage>,
}

impl ToilLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the accrual row for (user, date).
    pub fn upsert_record(&mut self, record: ToilRecord) {
        self.records
            .insert((record.user_id.clone(), record.date), record);
    }

    /// Drop the accrual row for (user, date), if any.
    pub fn remove_record(&mut self, user_id: &str, date: NaiveDate) -> bool {
        self.records.remove(&(user_id.to_string(), date)).is_some()
    }

    /// Drop every accrual row for the user inside the scope. The engine
    /// calls this before rebuilding so deleted entries lose their
    /// contribution exactly once.
    pub fn remove_records_in_scope(&mut self, user_id: &str, scope: CalcScope) {
        self.records
            .retain(|(user, date), _| !(user == user_id && scope.contains(*date)));
    }

    /// Replace the user's usage rows inside the scope with `rows`.
    pub fn replace_usages_in_scope(
        &mut self,
        user_id: &str,
        scope: CalcScope,
        rows: Vec<ToilUsage>,
    ) {
        self.usages
            .retain(|_, usage| !(usage.user_id == user_id && scope.contains(usage.date)));
        for row in rows {
            self.usages.insert(row.entry_id.clone(), row);
        }
    }

    pub fn record_for(&self, user_id: &str, date: NaiveDate) -> Option<&ToilRecord> {
        self.records.get(&(user_id.to_string(), date))
    }

    pub fn usage_for_entry(&self, entry_id: &str) -> Option<&ToilUsage> {
        self.usages.get(entry_id)
    }

    /// Accrual rows for the user's month, sorted by date.
    pub fn records_for_month(&self, user_id: &str, month: MonthKey) -> Vec<&ToilRecord> {
        let mut rows: Vec<&ToilRecord> = self
            .records
            .values()
            .filter(|r| r.user_id == user_id && month.contains(r.date))
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }

    /// Usage rows for the user's month, sorted by (date, entry id).
    pub fn usages_for_month(&self, user_id: &str, month: MonthKey) -> Vec<&ToilUsage> {
        let mut rows: Vec<&ToilUsage> = self
            .usages
            .values()
            .filter(|u| u.user_id == user_id && month.contains(u.date))
            .collect();
        rows.sort_by(|a, b| (a.date, &a.entry_id).cmp(&(b.date, &b.entry_id)));
        rows
    }

    /// Month balance from the ledger rows. Rows are summed in sorted
    /// order so identical inputs always produce bit-identical floats.
    pub fn summarize(&self, user_id: &str, month: MonthKey) -> ToilSummary {
        let accrued: f64 = self
            .records_for_month(user_id, month)
            .iter()
            .map(|r| r.hours_accrued)
            .sum();
        let used: f64 = self
            .usages_for_month(user_id, month)
            .iter()
            .map(|u| u.hours_used)
            .sum();
        ToilSummary {
            user_id: user_id.to_string(),
            month,
            accrued,
            used,
            remaining: accrued - used,
        }
    }

    /// Months the user currently has any ledger row in, ascending.
    pub fn months_for_user(&self, user_id: &str) -> Vec<MonthKey> {
        let months: BTreeSet<MonthKey> = self
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| MonthKey::from_date(r.date))
            .chain(
                self.usages
                    .values()
                    .filter(|u| u.user_id == user_id)
                    .map(|u| MonthKey::from_date(u.date)),
            )
            .collect();
        months.into_iter().collect()
    }

    /// Drop every row for a user.
    pub fn clear_user(&mut self, user_id: &str) {
        self.records.retain(|(user, _), _| user != user_id);
        self.usages.retain(|_, usage| usage.user_id != user_id);
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.usages.clear();
    }
}
