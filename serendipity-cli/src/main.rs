//! Serendipity CLI - Command-line interface
//!
//! Replays recorded walks through the discovery loop and manages the local
//! pin preference store.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::prefs::PrefsCommands;
use commands::replay::ReplayArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "serendipity")]
#[command(version, about = "Walk-to-discover hidden message pins", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.serendipity/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a recorded walk through the discovery loop
    Replay {
        /// JSON file with the pins to discover
        #[arg(long, value_name = "FILE", required_unless_present = "http", conflicts_with = "http")]
        pins: Option<PathBuf>,

        /// JSON array of position fixes
        #[arg(long, value_name = "FILE")]
        track: PathBuf,

        /// Fetch pins from the pin store configured in [pin_store]
        #[arg(long)]
        http: bool,

        /// Pace fixes by their timestamps and run the heartbeat
        #[arg(long)]
        realtime: bool,

        /// Playback speed multiplier for --realtime
        #[arg(long, default_value_t = 1.0, requires = "realtime")]
        speed: f64,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Manage per-pin notification preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => commands::config::run(cli.config.as_deref(), command),
        Commands::Prefs { command } => {
            let runner = CliRunner::new(cli.config.as_deref())?;
            commands::prefs::run(&runner, command)
        }
        Commands::Replay {
            pins,
            track,
            http,
            realtime,
            speed,
            json,
        } => {
            let runner = CliRunner::new(cli.config.as_deref())?;
            commands::replay::run(
                &runner,
                ReplayArgs {
                    pins,
                    track,
                    http,
                    realtime,
                    speed,
                    json,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_replay_requires_a_pin_source() {
        assert!(Cli::try_parse_from(["serendipity", "replay", "--track", "walk.json"]).is_err());
        assert!(Cli::try_parse_from([
            "serendipity", "replay", "--track", "walk.json", "--pins", "pins.json", "--http",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "serendipity", "replay", "--track", "walk.json", "--pins", "pins.json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Replay { http: false, realtime: false, .. }
        ));
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["serendipity", "prefs", "list", "--config", "/tmp/c.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.ini")));
        assert!(matches!(
            cli.command,
            Commands::Prefs {
                command: PrefsCommands::List
            }
        ));
    }
}
