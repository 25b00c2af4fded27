//! Work schedule commands.

use chrono::{NaiveDate, NaiveTime};
use clap::Subcommand;
use timebank_core::{DaySchedule, WorkSchedule};

use crate::host::Host;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Show the current schedule
    Show,
    /// Create a standard Mon-Fri schedule
    Init {
        /// Anchor date; snapped back to the Monday of its week
        #[arg(long)]
        anchor: NaiveDate,
        /// Daily start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        /// Daily end time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
    },
    /// Set one weekday's hours in one rotation week
    SetDay {
        /// Rotation week (0 or 1)
        week: usize,
        /// Weekday index, 0 = Monday .. 6 = Sunday
        weekday: u8,
        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        /// End time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        /// Unpaid break in minutes
        #[arg(long, default_value = "0")]
        unpaid_break: u32,
    },
    /// Mark one weekday non-working
    ClearDay {
        /// Rotation week (0 or 1)
        week: usize,
        /// Weekday index, 0 = Monday .. 6 = Sunday
        weekday: u8,
    },
    /// Replace one week's rostered-days-off list
    SetRdo {
        /// Rotation week (0 or 1)
        week: usize,
        /// Weekday indexes, 0 = Monday .. 6 = Sunday; empty clears
        weekdays: Vec<u8>,
    },
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;

    match action {
        ScheduleAction::Show => match host.service.schedule() {
            Some(schedule) => println!("{}", serde_json::to_string_pretty(&schedule)?),
            None => println!("no schedule configured"),
        },
        ScheduleAction::Init { anchor, start, end } => {
            let schedule = WorkSchedule::standard(anchor, start, end);
            host.save_schedule(&schedule)?;
            println!("schedule initialized from {}", schedule.anchor_monday);
        }
        ScheduleAction::SetDay {
            week,
            weekday,
            start,
            end,
            unpaid_break,
        } => {
            let mut schedule = require_schedule(&host)?;
            schedule.set_day(
                week,
                weekday,
                Some(DaySchedule::with_break(start, end, unpaid_break)),
            )?;
            host.save_schedule(&schedule)?;
            println!("schedule updated");
        }
        ScheduleAction::ClearDay { week, weekday } => {
            let mut schedule = require_schedule(&host)?;
            schedule.set_day(week, weekday, None)?;
            host.save_schedule(&schedule)?;
            println!("schedule updated");
        }
        ScheduleAction::SetRdo { week, weekdays } => {
            let mut schedule = require_schedule(&host)?;
            schedule.set_rdo_weekdays(week, weekdays)?;
            host.save_schedule(&schedule)?;
            println!("schedule updated");
        }
    }
    Ok(())
}

fn require_schedule(host: &Host) -> Result<WorkSchedule, Box<dyn std::error::Error>> {
    host.service
        .schedule()
        .ok_or_else(|| "no schedule configured; run `timebank schedule init` first".into())
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{s}' (expected HH:MM)"))
}
