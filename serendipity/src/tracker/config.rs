//! Location update loop configuration.

use std::time::Duration;

use thiserror::Error;

/// Default heartbeat interval (10 seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Default movement threshold in meters.
pub const DEFAULT_MOVEMENT_THRESHOLD_M: f64 = 20.0;

/// A tracker setting the loop cannot run with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerConfigError {
    /// `tokio::time::interval` rejects a zero period.
    #[error("heartbeat interval must be greater than zero")]
    ZeroHeartbeat,

    #[error("movement threshold must be a positive number of meters, got {meters}")]
    InvalidMovementThreshold { meters: f64 },
}

/// Triggers for the location update loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Interval between heartbeat evaluations while stationary.
    pub heartbeat_interval: Duration,

    /// Cumulative travel (meters) that triggers an early evaluation.
    pub movement_threshold_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
        }
    }
}

impl TrackerConfig {
    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the movement threshold in meters.
    pub fn with_movement_threshold(mut self, meters: f64) -> Self {
        self.movement_threshold_m = meters;
        self
    }

    /// Check the configuration for values the loop cannot run with.
    pub fn validate(&self) -> Result<(), TrackerConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(TrackerConfigError::ZeroHeartbeat);
        }
        if !(self.movement_threshold_m.is_finite() && self.movement_threshold_m > 0.0) {
            return Err(TrackerConfigError::InvalidMovementThreshold {
                meters: self.movement_threshold_m,
            });
        }
        Ok(())
    }
}
