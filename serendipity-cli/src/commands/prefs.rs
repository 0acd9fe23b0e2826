//! Preference CLI commands.
//!
//! Rate pins the way the app's "Good" and "Bad" buttons do, lift mutes, and
//! inspect or wipe the stored collection.

use chrono::{DateTime, Local};
use clap::Subcommand;
use serendipity::pin::PinId;
use serendipity::preferences::PinPreference;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Prefs subcommands.
#[derive(Debug, Subcommand)]
pub enum PrefsCommands {
    /// Rate a pin "Good": no notification again until the cooldown passes
    Good {
        /// Pin identifier
        pin: String,
    },

    /// Rate a pin "Bad": never notify again
    Bad {
        /// Pin identifier
        pin: String,
    },

    /// Lift a mute so the pin can notify again
    Unmute {
        /// Pin identifier
        pin: String,
    },

    /// List stored preferences
    List,

    /// Erase all stored preferences
    Clear,
}

/// Run a prefs subcommand.
pub fn run(runner: &CliRunner, command: PrefsCommands) -> Result<(), CliError> {
    runner.log_startup("prefs");
    let preferences = runner.preferences();

    match command {
        PrefsCommands::Good { pin } => {
            let id = PinId::new(pin);
            runner.block_on(preferences.mark_good(&id));
            let next = preferences
                .get_preference(&id)
                .and_then(|p| p.next_notify)
                .map(format_ms)
                .unwrap_or_else(|| "-".to_string());
            println!("Pin {} marked good; next notification after {}", id, next);
        }
        PrefsCommands::Bad { pin } => {
            let id = PinId::new(pin);
            runner.block_on(preferences.mark_bad(&id));
            println!("Pin {} muted", id);
        }
        PrefsCommands::Unmute { pin } => {
            let id = PinId::new(pin);
            runner.block_on(preferences.unmute(&id));
            println!("Pin {} unmuted", id);
        }
        PrefsCommands::List => {
            let entries = preferences.snapshot();
            if entries.is_empty() {
                println!("No pin preferences stored.");
                return Ok(());
            }

            let now = chrono::Utc::now().timestamp_millis();
            println!(
                "{:<16} {:<9} {:<17} {:<17}",
                "PIN", "STATUS", "NEXT NOTIFY", "LAST SEEN"
            );
            for (id, pref) in entries {
                println!(
                    "{:<16} {:<9} {:<17} {:<17}",
                    id.as_str(),
                    status(&pref, now),
                    pref.next_notify.map(format_ms).unwrap_or_else(|| "-".to_string()),
                    format_ms(pref.last_seen)
                );
            }
        }
        PrefsCommands::Clear => {
            let count = preferences.len();
            runner.block_on(preferences.clear_all());
            println!("Cleared {} pin preferences", count);
        }
    }

    Ok(())
}

fn status(pref: &PinPreference, now_ms: i64) -> &'static str {
    if pref.muted {
        "muted"
    } else if pref.allows_notification(now_ms) {
        "eligible"
    } else {
        "cooling"
    }
}

/// Format epoch milliseconds in local time.
fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}
