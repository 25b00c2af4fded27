//! TOIL balance and calculation commands.

use chrono::NaiveDate;
use clap::Subcommand;
use timebank_core::{MonthKey, QueueOutcome, TriggerSource};

use crate::format;
use crate::host::Host;

#[derive(Subcommand)]
pub enum ToilAction {
    /// Month balance for a user
    Summary {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Month (YYYY-MM); defaults to the current month
        #[arg(long)]
        month: Option<MonthKey>,
    },
    /// Recalculate the month containing a day
    Day {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Day (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
    /// Force a fresh calculation past the cache
    Refresh {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Month (YYYY-MM); defaults to the current month
        #[arg(long)]
        month: Option<MonthKey>,
    },
    /// Queue a calculation through the coordinator
    Trigger {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Month (YYYY-MM); defaults to the current month
        #[arg(long)]
        month: Option<MonthKey>,
    },
    /// Rebuild every month the user has data in
    Regenerate {
        /// Owning user id
        #[arg(long)]
        user: String,
    },
}

pub fn run(action: ToilAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;

    match action {
        ToilAction::Summary { user, month } => {
            let summary = host.service.summary(&user, month.unwrap_or_else(current_month));
            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("{}", format::summary_line(&summary));
        }
        ToilAction::Day { user, date } => match host.service.calculate_toil_for_day(&user, date) {
            Some(summary) => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                println!("{}", format::summary_line(&summary));
            }
            None => {
                eprintln!("calculation unavailable for {user} on {date}; see `timebank breaker status`");
                std::process::exit(1);
            }
        },
        ToilAction::Refresh { user, month } => {
            let summary = host
                .service
                .refresh_summary(&user, month.unwrap_or_else(current_month));
            host.service.drain();
            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("{}", format::summary_line(&summary));
        }
        ToilAction::Trigger { user, month } => {
            let month = month.unwrap_or_else(current_month);
            let outcome =
                host.service
                    .trigger_toil_calculation(&user, month, TriggerSource::Manual);
            match outcome {
                QueueOutcome::Queued => println!("queued: {user} {month}"),
                QueueOutcome::DroppedDuplicate => println!("dropped duplicate: {user} {month}"),
            }
            let delivered = host.service.drain();
            println!("flushed {delivered} notifications");
        }
        ToilAction::Regenerate { user } => {
            let summaries = host.service.regenerate(&user);
            host.service.drain();
            println!("Regenerated {} months for {user}", summaries.len());
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }
    Ok(())
}

fn current_month() -> MonthKey {
    MonthKey::from_date(chrono::Local::now().date_naive())
}
