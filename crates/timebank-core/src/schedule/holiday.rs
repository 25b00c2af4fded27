//! Public holiday calendar.
//!
//! Hours worked on a holiday are fully eligible for accrual: the
//! calculation engine treats the scheduled hours for a holiday as zero
//! regardless of the work schedule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One public holiday in one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Holiday {
    pub fn new(date: NaiveDate, region: impl Into<String>) -> Self {
        Self {
            date,
            region: region.into(),
            name: None,
        }
    }

    pub fn named(date: NaiveDate, region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            date,
            region: region.into(),
            name: Some(name.into()),
        }
    }
}

/// Set of holidays, deduplicated by (date, region).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolidayCalendar {
    holidays: Vec<Holiday>,
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_holidays(holidays: Vec<Holiday>) -> Self {
        let mut calendar = Self::new();
        for holiday in holidays {
            calendar.add(holiday);
        }
        calendar
    }

    /// Add a holiday. Returns false when the same (date, region) pair
    /// is already present; the existing entry wins.
    pub fn add(&mut self, holiday: Holiday) -> bool {
        if self
            .holidays
            .iter()
            .any(|h| h.date == holiday.date && h.region == holiday.region)
        {
            return false;
        }
        self.holidays.push(holiday);
        self.holidays.sort_by(|a, b| (a.date, &a.region).cmp(&(b.date, &b.region)));
        true
    }

    /// Remove one (date, region) entry. Returns false when absent.
    pub fn remove(&mut self, date: NaiveDate, region: &str) -> bool {
        let before = self.holidays.len();
        self.holidays.retain(|h| !(h.date == date && h.region == region));
        self.holidays.len() != before
    }

    /// Is any region observing a holiday on `date`?
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.iter().any(|h| h.date == date)
    }

    pub fn holidays_on(&self, date: NaiveDate) -> Vec<&Holiday> {
        self.holidays.iter().filter(|h| h.date == date).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holiday> {
        self.holidays.iter()
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let mut calendar = HolidayCalendar::new();
        assert!(calendar.add(Holiday::named(d(2025, 6, 9), "WA", "WA Day")));
        assert!(calendar.is_holiday(d(2025, 6, 9)));
        assert!(!calendar.is_holiday(d(2025, 6, 10)));
        assert_eq!(calendar.holidays_on(d(2025, 6, 9)).len(), 1);
    }

    #[test]
    fn test_duplicate_date_region_rejected() {
        let mut calendar = HolidayCalendar::new();
        assert!(calendar.add(Holiday::new(d(2025, 12, 25), "NSW")));
        assert!(!calendar.add(Holiday::new(d(2025, 12, 25), "NSW")));
        // Same date, different region is a separate entry.
        assert!(calendar.add(Holiday::new(d(2025, 12, 25), "VIC")));
        assert_eq!(calendar.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut calendar = HolidayCalendar::from_holidays(vec![
            Holiday::new(d(2025, 12, 25), "NSW"),
            Holiday::new(d(2025, 12, 26), "NSW"),
        ]);
        assert!(calendar.remove(d(2025, 12, 25), "NSW"));
        assert!(!calendar.remove(d(2025, 12, 25), "NSW"));
        assert!(!calendar.is_holiday(d(2025, 12, 25)));
        assert!(calendar.is_holiday(d(2025, 12, 26)));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let calendar =
            HolidayCalendar::from_holidays(vec![Holiday::new(d(2025, 12, 25), "NSW")]);
        let json = serde_json::to_value(&calendar).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["region"], "NSW");

        let parsed: HolidayCalendar = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
