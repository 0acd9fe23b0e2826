//! CLI subcommands.

pub mod config;
pub mod prefs;
pub mod replay;
