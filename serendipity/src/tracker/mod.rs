//! Location tracking and the discovery update loop.
//!
//! Position fixes flow in through a `tokio::sync::watch` channel; the
//! [`LocationUpdateLoop`] turns them (and a heartbeat) into discovery
//! cycles and reports results to a [`NotificationSink`].

mod config;
mod position;
mod sink;
mod update_loop;

pub use config::{
    TrackerConfig, TrackerConfigError, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MOVEMENT_THRESHOLD_M,
};
pub use position::{MovementTrigger, PositionSample};
pub use sink::{
    ChannelSink, LoggingSink, NotificationEvent, NotificationSink, PassByEvent, SinkEvent,
};
pub use update_loop::{CycleOutcome, CycleReport, LocationUpdateLoop, LoopStats, Trigger};
