//! Holiday calendar commands.

use chrono::NaiveDate;
use clap::Subcommand;
use timebank_core::Holiday;

use crate::host::Host;

#[derive(Subcommand)]
pub enum HolidayAction {
    /// Add a holiday
    Add {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
        /// Region code
        region: String,
        /// Holiday name
        #[arg(long)]
        name: Option<String>,
    },
    /// List all holidays
    List,
    /// Remove a holiday
    Remove {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
        /// Region code
        region: String,
    },
}

pub fn run(action: HolidayAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;

    match action {
        HolidayAction::Add { date, region, name } => {
            let mut holidays = host.service.holidays();
            let holiday = match name {
                Some(name) => Holiday::named(date, region, name),
                None => Holiday::new(date, region),
            };
            if !holidays.add(holiday) {
                println!("holiday already present");
                return Ok(());
            }
            host.save_holidays(&holidays)?;
            println!("holiday added ({} total)", holidays.len());
        }
        HolidayAction::List => {
            let holidays = host.service.holidays();
            println!("{}", serde_json::to_string_pretty(&holidays)?);
        }
        HolidayAction::Remove { date, region } => {
            let mut holidays = host.service.holidays();
            if !holidays.remove(date, &region) {
                eprintln!("no holiday on {date} in {region}");
                std::process::exit(1);
            }
            host.save_holidays(&holidays)?;
            println!("holiday removed");
        }
    }
    Ok(())
}
