//! ImageryLayer CLI - Command-line interface
//!
//! Maps terrain tiles to the imagery tiles that cover them and drives that
//! imagery through fetching and texture realization.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use imagerylayer::logging::{default_log_dir, default_log_file, init_logging};

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::map::MapArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "imagerylayer")]
#[command(version = imagerylayer::VERSION)]
#[command(about = "Resolve, fetch and realize imagery tiles for terrain tiles", long_about = None)]
struct Cli {
    /// Use this config file instead of ~/.imagerylayer/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which imagery tiles cover the terrain tiles of an area
    Map(MapArgs),

    /// Fetch imagery for the terrain tiles of an area and report the outcome
    Fetch(FetchArgs),

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { command } => commands::config::run(command, config_path),
        Commands::Map(args) => {
            let _guard = start_logging(cli.log_dir)?;
            commands::map::run(args, config_path)
        }
        Commands::Fetch(args) => {
            let _guard = start_logging(cli.log_dir)?;
            commands::fetch::run(args, config_path)
        }
    }
}

fn start_logging(
    log_dir: Option<PathBuf>,
) -> Result<imagerylayer::logging::LoggingGuard, CliError> {
    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    init_logging(&log_dir, default_log_file()).map_err(|e| CliError::LoggingInit(e.to_string()))
}
