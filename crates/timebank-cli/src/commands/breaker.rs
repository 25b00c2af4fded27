//! Calculation gate commands.
//!
//! The gate lives in process memory; stop and resume affect only the
//! invoking process.

use clap::Subcommand;

use crate::host::Host;

#[derive(Subcommand)]
pub enum BreakerAction {
    /// Show the calculation gate state
    Status,
    /// Stop all calculations
    Stop,
    /// Resume calculations
    Resume,
}

pub fn run(action: BreakerAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;

    match action {
        BreakerAction::Status => {
            let status = host.service.breaker_status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        BreakerAction::Stop => {
            host.service.stop_calculations();
            println!("calculations stopped");
        }
        BreakerAction::Resume => {
            host.service.resume_calculations();
            println!("calculations resumed");
        }
    }
    Ok(())
}
