//! Position samples and movement detection.
//!
//! Fixes arrive from the platform position provider as [`PositionSample`]s.
//! [`MovementTrigger`] sums the length of each segment between successive
//! fixes and fires once the walked distance since the last evaluation
//! reaches the threshold. Summing segments (rather than measuring straight
//! from the last evaluated point) means pacing back and forth still counts.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Compass heading in degrees, when the provider reports one.
    #[serde(default)]
    pub heading_degrees: Option<f64>,
    /// When the fix was taken, epoch milliseconds.
    #[serde(default)]
    pub timestamp_ms: i64,
}

impl PositionSample {
    /// Create a sample without heading.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            heading_degrees: None,
            timestamp_ms,
        }
    }

    /// Attach a heading.
    pub fn with_heading(mut self, degrees: f64) -> Self {
        self.heading_degrees = Some(degrees);
        self
    }

    /// The position as a coordinate.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Accumulates travelled distance between evaluations.
///
/// # Usage
///
/// ```ignore
/// let mut trigger = MovementTrigger::new(20.0);
/// if trigger.record(&sample) {
///     run_cycle().await;
///     trigger.reset();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MovementTrigger {
    threshold_m: f64,
    accumulated_m: f64,
    last: Option<Coordinate>,
}

impl MovementTrigger {
    /// Create a trigger that fires after `threshold_m` meters.
    pub fn new(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            accumulated_m: 0.0,
            last: None,
        }
    }

    /// Record a fix. Returns `true` when the threshold has been reached.
    ///
    /// The first fix only establishes the reference point. Non-finite fixes
    /// are ignored.
    pub fn record(&mut self, sample: &PositionSample) -> bool {
        let here = sample.coordinate();
        if !here.is_finite() {
            return false;
        }
        if let Some(previous) = self.last.replace(here) {
            self.accumulated_m += previous.distance_to(&here);
        }
        self.accumulated_m >= self.threshold_m
    }

    /// Start a new accumulation window from the last recorded fix.
    pub fn reset(&mut self) {
        self.accumulated_m = 0.0;
    }

    /// Forget the reference point as well (position lost).
    pub fn clear(&mut self) {
        self.accumulated_m = 0.0;
        self.last = None;
    }

    /// Distance walked since the last reset, in meters.
    pub fn accumulated_m(&self) -> f64 {
        self.accumulated_m
    }

    /// The threshold in meters.
    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M_PER_DEG_LAT: f64 = 111_194.93;

    fn north(meters: f64) -> PositionSample {
        PositionSample::new(35.0 + meters / M_PER_DEG_LAT, 139.0, 0)
    }

    #[test]
    fn test_first_fix_never_fires() {
        let mut trigger = MovementTrigger::new(20.0);
        assert!(!trigger.record(&north(0.0)));
        assert_eq!(trigger.accumulated_m(), 0.0);
    }

    #[test]
    fn test_accumulates_segments() {
        let mut trigger = MovementTrigger::new(20.0);
        trigger.record(&north(0.0));
        assert!(!trigger.record(&north(8.0)));
        assert!(!trigger.record(&north(16.0)));
        assert!(trigger.record(&north(24.0)));
        assert!((trigger.accumulated_m() - 24.0).abs() < 0.01);
    }

    #[test]
    fn test_back_and_forth_counts() {
        let mut trigger = MovementTrigger::new(20.0);
        trigger.record(&north(0.0));
        trigger.record(&north(12.0));
        // Net displacement is zero but 24 m were walked
        assert!(trigger.record(&north(0.0)));
    }

    #[test]
    fn test_reset_keeps_reference_point() {
        let mut trigger = MovementTrigger::new(20.0);
        trigger.record(&north(0.0));
        assert!(trigger.record(&north(25.0)));

        trigger.reset();
        assert_eq!(trigger.accumulated_m(), 0.0);
        assert!(!trigger.record(&north(35.0)));
        assert!(trigger.record(&north(46.0)));
    }

    #[test]
    fn test_clear_drops_reference_point() {
        let mut trigger = MovementTrigger::new(20.0);
        trigger.record(&north(0.0));
        trigger.clear();
        assert!(!trigger.record(&north(500.0)));
    }

    #[test]
    fn test_non_finite_fix_ignored() {
        let mut trigger = MovementTrigger::new(20.0);
        trigger.record(&north(0.0));
        assert!(!trigger.record(&PositionSample::new(f64::NAN, 139.0, 0)));
        assert!(!trigger.record(&north(10.0)));
        assert!((trigger.accumulated_m() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_sample_json_shape() {
        let sample: PositionSample =
            serde_json::from_str(r#"{"latitude":35.0,"longitude":139.0,"headingDegrees":90.0}"#)
                .unwrap();
        assert_eq!(sample.heading_degrees, Some(90.0));
        assert_eq!(sample.timestamp_ms, 0);
    }
}
