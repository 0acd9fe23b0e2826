//! Serendipity - walk-to-discover hidden message pins
//!
//! This library decides which nearby pins a walking user has discovered and
//! whether each discovery should raise a notification.
//!
//! # Modules
//!
//! - [`geo`]: haversine distance and bearing
//! - [`pin`]: pin model and pin store adapters
//! - [`preferences`]: durable per-pin mute and cooldown policy
//! - [`discovery`]: distance tiers and the per-session state machine
//! - [`tracker`]: the location update loop (heartbeat, movement, single flight)
//! - [`kv`]: key-value persistence backends
//! - [`config`]: INI configuration file
//! - [`logging`]: tracing subscriber setup

pub mod clock;
pub mod config;
pub mod discovery;
pub mod geo;
pub mod kv;
pub mod logging;
pub mod pin;
pub mod preferences;
pub mod tracker;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
