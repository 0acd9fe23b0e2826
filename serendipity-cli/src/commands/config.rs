//! Configuration CLI commands.
//!
//! Provides `config path` and `config show` for inspecting the effective
//! settings without editing the file.

use std::path::Path;

use clap::Subcommand;
use serendipity::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file values over defaults)
    Show,
}

/// Run a config subcommand.
///
/// Runs without logging or a runtime so a broken file can still be located.
pub fn run(config_override: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    let path = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            if !path.exists() {
                println!("(not created yet; defaults are in effect)");
            }
        }
        ConfigCommands::Show => {
            let config = ConfigFile::load_from(&path)?;
            println!("; {}", path.display());
            print!("{}", config.to_ini_string());
        }
    }

    Ok(())
}
