//! Fortnight work schedules.
//!
//! A [`WorkSchedule`] is a two-week rotation anchored at a Monday. Each
//! weekday in each rotation week is either a working-hours interval
//! ([`DaySchedule`]) or a non-working day, and each week carries a list
//! of rostered-day-off (RDO) weekdays. `scheduled_hours` resolves a
//! calendar date to the hours the schedule expects for it; overtime is
//! whatever was actually worked beyond that.

mod holiday;

pub use holiday::{Holiday, HolidayCalendar};

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Working-hours interval for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Unpaid break deducted from the span, in minutes.
    #[serde(default)]
    pub unpaid_break_min: u32,
}

impl DaySchedule {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end,
            unpaid_break_min: 0,
        }
    }

    pub fn with_break(start: NaiveTime, end: NaiveTime, unpaid_break_min: u32) -> Self {
        Self {
            start,
            end,
            unpaid_break_min,
        }
    }

    /// Paid hours in the interval: the span minus the unpaid break,
    /// floored at zero.
    ///
    /// # Errors
    /// `ScheduleError::InvalidInterval` when `end` is not after `start`.
    pub fn working_hours(&self) -> Result<f64, ScheduleError> {
        if self.end <= self.start {
            return Err(ScheduleError::InvalidInterval {
                start: self.start,
                end: self.end,
            });
        }
        let span_min = (self.end - self.start).num_minutes() as f64;
        let paid_min = span_min - f64::from(self.unpaid_break_min);
        Ok((paid_min / 60.0).max(0.0))
    }
}

/// One week of the fortnight rotation.
///
/// `days` is indexed 0 = Monday .. 6 = Sunday; `None` marks a
/// non-working day. `rdo_weekdays` uses the same indexing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekPattern {
    pub days: [Option<DaySchedule>; 7],
    #[serde(default)]
    pub rdo_weekdays: Vec<u8>,
}

impl WeekPattern {
    /// Monday through Friday share `day`; the weekend is off.
    pub fn weekdays(day: DaySchedule) -> Self {
        Self {
            days: [
                Some(day),
                Some(day),
                Some(day),
                Some(day),
                Some(day),
                None,
                None,
            ],
            rdo_weekdays: Vec::new(),
        }
    }

    pub fn is_rdo(&self, weekday: u8) -> bool {
        self.rdo_weekdays.contains(&weekday)
    }
}

/// Two-week repeating work pattern.
///
/// `anchor_monday` is the Monday that starts rotation week 0; which
/// week a date falls in is pure day arithmetic from there, so the
/// rotation extends backwards in time as well as forwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub anchor_monday: NaiveDate,
    pub weeks: [WeekPattern; 2],
}

impl WorkSchedule {
    /// Build a schedule from an anchor date and two week patterns. The
    /// anchor is snapped back to the Monday of its week.
    pub fn new(anchor: NaiveDate, weeks: [WeekPattern; 2]) -> Self {
        let offset = i64::from(anchor.weekday().num_days_from_monday());
        let anchor_monday = anchor - chrono::Duration::days(offset);
        Self {
            anchor_monday,
            weeks,
        }
    }

    /// Same Mon-Fri interval in both rotation weeks.
    pub fn standard(anchor: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        let week = WeekPattern::weekdays(DaySchedule::new(start, end));
        Self::new(anchor, [week.clone(), week])
    }

    /// Which rotation week (0 or 1) a date falls in.
    pub fn rotation_week(&self, date: NaiveDate) -> usize {
        let days = (date - self.anchor_monday).num_days();
        // div_euclid floors for dates before the anchor.
        days.div_euclid(7).rem_euclid(2) as usize
    }

    /// Replace one weekday's interval in one rotation week.
    ///
    /// # Errors
    /// `InvalidWeek` / `InvalidWeekday` when either index is out of
    /// range.
    pub fn set_day(
        &mut self,
        week: usize,
        weekday: u8,
        day: Option<DaySchedule>,
    ) -> Result<(), ScheduleError> {
        if week > 1 {
            return Err(ScheduleError::InvalidWeek { index: week });
        }
        if weekday > 6 {
            return Err(ScheduleError::InvalidWeekday { index: weekday });
        }
        self.weeks[week].days[usize::from(weekday)] = day;
        Ok(())
    }

    /// Replace one rotation week's RDO weekday list.
    pub fn set_rdo_weekdays(&mut self, week: usize, weekdays: Vec<u8>) -> Result<(), ScheduleError> {
        if week > 1 {
            return Err(ScheduleError::InvalidWeek { index: week });
        }
        if let Some(&bad) = weekdays.iter().find(|&&w| w > 6) {
            return Err(ScheduleError::InvalidWeekday { index: bad });
        }
        self.weeks[week].rdo_weekdays = weekdays;
        Ok(())
    }

    /// Is `date` a rostered day off in its rotation week?
    pub fn is_rdo(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_monday() as u8;
        self.weeks[self.rotation_week(date)].is_rdo(weekday)
    }

    /// Hours the schedule expects for `date`: 0 for non-working days
    /// and RDOs, otherwise the day interval's paid hours.
    ///
    /// # Errors
    /// Propagates `InvalidInterval` from a malformed day interval.
    pub fn scheduled_hours(&self, date: NaiveDate) -> Result<f64, ScheduleError> {
        if self.is_rdo(date) {
            return Ok(0.0);
        }
        let weekday = date.weekday().num_days_from_monday() as usize;
        match &self.weeks[self.rotation_week(date)].days[weekday] {
            Some(day) => day.working_hours(),
            None => Ok(0.0),
        }
    }
}
