//! Time entry commands.

use chrono::NaiveDate;
use clap::Subcommand;
use timebank_core::{EntryPatch, EntryStatus, MonthKey, NewEntry};

use crate::format;
use crate::host::Host;

#[derive(Subcommand)]
pub enum EntryAction {
    /// Add a time entry
    Add {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Day worked (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Hours worked
        #[arg(long)]
        hours: f64,
        /// Job/cost code; the configured TOIL code marks a usage entry
        #[arg(long)]
        job: Option<String>,
        /// Review status: draft, submitted or approved
        #[arg(long, value_parser = parse_status)]
        status: Option<EntryStatus>,
    },
    /// List entries for a user
    List {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Restrict to one month (YYYY-MM)
        #[arg(long)]
        month: Option<MonthKey>,
    },
    /// Update an entry
    Update {
        /// Entry id
        id: String,
        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// New hours
        #[arg(long)]
        hours: Option<f64>,
        /// New job/cost code
        #[arg(long, conflicts_with = "clear_job")]
        job: Option<String>,
        /// Clear the job/cost code
        #[arg(long)]
        clear_job: bool,
        /// New review status
        #[arg(long, value_parser = parse_status)]
        status: Option<EntryStatus>,
    },
    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
    },
    /// Delete every entry for a user and rebuild their balances
    Purge {
        /// Owning user id
        #[arg(long)]
        user: String,
    },
}

pub fn run(action: EntryAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;

    match action {
        EntryAction::Add {
            user,
            date,
            hours,
            job,
            status,
        } => {
            let new = NewEntry {
                user_id: user.clone(),
                date,
                hours,
                job_number: job,
                status: status.unwrap_or_default(),
            };
            let id = host.block_on(host.service.create_entry(new))?;
            host.service.drain();
            println!("Entry created: {id}");
            let summary = host.service.summary(&user, MonthKey::from_date(date));
            println!("{}", format::summary_line(&summary));
        }
        EntryAction::List { user, month } => {
            let entries = match month {
                Some(month) => host
                    .service
                    .store()
                    .get_month_entries(month.first_day(), &user),
                None => host.service.store().get_user_entries(&user),
            };
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        EntryAction::Update {
            id,
            date,
            hours,
            job,
            clear_job,
            status,
        } => {
            let job_number = if clear_job { Some(None) } else { job.map(Some) };
            let patch = EntryPatch {
                date,
                hours,
                job_number,
                status,
            };
            let updated = host.block_on(host.service.update_entry(&id, patch))?;
            if !updated {
                eprintln!("entry not found: {id}");
                std::process::exit(1);
            }
            host.service.drain();
            match host.service.store().get_entry(&id) {
                Some(entry) => {
                    println!("Entry updated:");
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                }
                None => println!("Entry updated: {id}"),
            }
        }
        EntryAction::Delete { id } => {
            let deleted = host.block_on(host.service.delete_entry(&id))?;
            if !deleted {
                eprintln!("entry not found: {id}");
                std::process::exit(1);
            }
            host.service.drain();
            println!("Entry deleted: {id}");
        }
        EntryAction::Purge { user } => {
            let removed = host.block_on(host.service.delete_user_entries(&user))?;
            host.service.drain();
            println!("Deleted {removed} entries for {user}");
        }
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<EntryStatus, String> {
    match s {
        "draft" => Ok(EntryStatus::Draft),
        "submitted" => Ok(EntryStatus::Submitted),
        "approved" => Ok(EntryStatus::Approved),
        other => Err(format!(
            "unknown status '{other}' (expected draft, submitted or approved)"
        )),
    }
}
