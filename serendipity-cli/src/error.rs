//! CLI error type.

use std::fmt;

use serendipity::config::ConfigError;
use serendipity::logging::LoggingError;
use serendipity::pin::PinSourceError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing configuration.
    Config(String),
    /// The configuration file could not be loaded.
    ConfigFile(ConfigError),
    /// Logging could not be initialized.
    Logging(LoggingError),
    /// Pins could not be loaded or fetched.
    PinSource(PinSourceError),
    /// A track file could not be read or parsed.
    Track(String),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::PinSource(e) => write!(f, "{}", e),
            CliError::Track(msg) => write!(f, "Track error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::PinSource(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Config(_) | CliError::Track(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PinSourceError> for CliError {
    fn from(e: PinSourceError) -> Self {
        CliError::PinSource(e)
    }
}
