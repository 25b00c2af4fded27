use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod commands;
mod format;
mod host;

#[derive(Parser)]
#[command(name = "timebank", version, about = "Timebank CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time entry management
    Entry {
        #[command(subcommand)]
        action: commands::entry::EntryAction,
    },
    /// TOIL balances and calculations
    Toil {
        #[command(subcommand)]
        action: commands::toil::ToilAction,
    },
    /// Calculation gate control
    Breaker {
        #[command(subcommand)]
        action: commands::breaker::BreakerAction,
    },
    /// Work schedule management
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Holiday calendar management
    Holiday {
        #[command(subcommand)]
        action: commands::holiday::HolidayAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Entry { action } => commands::entry::run(action),
        Commands::Toil { action } => commands::toil::run(action),
        Commands::Breaker { action } => commands::breaker::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Holiday { action } => commands::holiday::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
