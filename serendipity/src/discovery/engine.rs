//! Distance tiering of candidate pins.
//!
//! Every evaluation recomputes the distance of every candidate from the
//! current user position. Candidate counts are tens, not millions, so no
//! distance is cached between cycles.
//!
//! # Tiers
//!
//! ```text
//!   0 ──── super_close ──── radius ──────────── radius × cutoff ───── community
//!   │  SuperClose (gold) │ Close (plum) │   Mystery (pink)   │ dropped
//!   │◄──────── discovered ────────────►│
//!                                       community pins: Community tier out to
//!                                       community_radius, discovered
//! ```

use std::collections::BTreeSet;

use super::config::DiscoveryConfig;
use crate::geo::Coordinate;
use crate::pin::{Pin, PinId};

/// Presentation band of a visible pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayTier {
    /// Inside the super-close radius.
    SuperClose,
    /// Inside the discovery radius.
    Close,
    /// Visible but not yet reachable.
    Mystery,
    /// Community pin outside the discovery radius but inside its geofence.
    Community,
}

impl DisplayTier {
    /// Short label for logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayTier::SuperClose => "super-close",
            DisplayTier::Close => "close",
            DisplayTier::Mystery => "mystery",
            DisplayTier::Community => "community",
        }
    }

    /// Marker color the map layer draws for this tier.
    pub fn marker_color(&self) -> &'static str {
        match self {
            DisplayTier::SuperClose => "gold",
            DisplayTier::Close => "plum",
            DisplayTier::Mystery => "pink",
            DisplayTier::Community => "teal",
        }
    }

    /// Whether a pin in this tier counts as discovered.
    pub fn is_discovered(&self) -> bool {
        !matches!(self, DisplayTier::Mystery)
    }
}

impl std::fmt::Display for DisplayTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate pin annotated with its distance and tier.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedPin {
    /// The pin, with `distance_m` filled in.
    pub pin: Pin,
    /// Distance from the user in meters.
    pub distance_m: f64,
    /// Presentation band.
    pub tier: DisplayTier,
}

impl EvaluatedPin {
    /// The pin id.
    pub fn id(&self) -> &PinId {
        &self.pin.id
    }

    /// Whether the pin is discovered.
    pub fn is_discovered(&self) -> bool {
        self.tier.is_discovered()
    }
}

/// Result of one evaluation, sorted nearest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    user: Option<Coordinate>,
    pins: Vec<EvaluatedPin>,
}

impl Evaluation {
    /// An evaluation with no location and no pins.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The user position this evaluation was computed for.
    pub fn user(&self) -> Option<Coordinate> {
        self.user
    }

    /// Every visible pin, nearest first.
    pub fn pins(&self) -> &[EvaluatedPin] {
        &self.pins
    }

    /// Discovered pins, nearest first.
    pub fn discovered(&self) -> impl Iterator<Item = &EvaluatedPin> {
        self.pins.iter().filter(|p| p.is_discovered())
    }

    /// Ids of the discovered pins.
    pub fn discovered_ids(&self) -> BTreeSet<PinId> {
        self.discovered().map(|p| p.id().clone()).collect()
    }

    /// Look up a visible pin.
    pub fn get(&self, id: &PinId) -> Option<&EvaluatedPin> {
        self.pins.iter().find(|p| p.id() == id)
    }

    /// Number of visible pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

/// Computes distances and tiers for candidate pins.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    /// Create an engine with the given thresholds.
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// The engine thresholds.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Classify a distance, or `None` if the pin is beyond every cutoff.
    pub fn classify(&self, distance_m: f64, community: bool) -> Option<DisplayTier> {
        let config = &self.config;
        if distance_m < config.super_close_radius_m {
            Some(DisplayTier::SuperClose)
        } else if distance_m < config.radius_m {
            Some(DisplayTier::Close)
        } else if community && distance_m <= config.community_radius_m {
            Some(DisplayTier::Community)
        } else if distance_m <= config.visibility_cutoff_m() {
            Some(DisplayTier::Mystery)
        } else {
            None
        }
    }

    /// Evaluate candidates against the user position.
    ///
    /// Without a position nothing is computed and the result is empty.
    pub fn evaluate(&self, user: Option<Coordinate>, candidates: Vec<Pin>) -> Evaluation {
        let Some(user) = user else {
            return Evaluation::empty();
        };

        let candidate_count = candidates.len();
        let mut pins: Vec<EvaluatedPin> = candidates
            .into_iter()
            .filter_map(|mut pin| {
                let distance_m = user.distance_to(&pin.coordinate);
                let tier = self.classify(distance_m, pin.community)?;
                pin.distance_m = Some(distance_m);
                Some(EvaluatedPin {
                    pin,
                    distance_m,
                    tier,
                })
            })
            .collect();

        pins.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        tracing::trace!(
            candidates = candidate_count,
            visible = pins.len(),
            user = %user,
            "Evaluated pins"
        );

        Evaluation {
            user: Some(user),
            pins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Meters per degree of latitude with a 6371 km sphere.
    const M_PER_DEG_LAT: f64 = 111_194.93;

    fn user() -> Coordinate {
        Coordinate::new(35.0, 139.0)
    }

    /// A pin `meters` due north of the test user.
    fn pin_north(id: &str, meters: f64) -> Pin {
        Pin::new(id, Coordinate::new(35.0 + meters / M_PER_DEG_LAT, 139.0))
    }

    #[test]
    fn test_reference_scenario_tiers() {
        let engine = DiscoveryEngine::default();
        let evaluation = engine.evaluate(
            Some(user()),
            vec![
                pin_north("C", 120.0),
                pin_north("A", 8.0),
                pin_north("B", 35.0),
            ],
        );

        assert_eq!(evaluation.len(), 2, "C is beyond the cutoff");
        assert_eq!(evaluation.pins()[0].id(), &PinId::from("A"));
        assert_eq!(evaluation.pins()[0].tier, DisplayTier::SuperClose);
        assert_eq!(evaluation.pins()[1].id(), &PinId::from("B"));
        assert_eq!(evaluation.pins()[1].tier, DisplayTier::Close);
        assert!(evaluation.get(&PinId::from("C")).is_none());

        let a = &evaluation.pins()[0];
        assert!((a.distance_m - 8.0).abs() < 0.01);
        assert_eq!(a.pin.distance_m, Some(a.distance_m));
    }

    #[test]
    fn test_mystery_band_is_visible_not_discovered() {
        let engine = DiscoveryEngine::default();
        let evaluation = engine.evaluate(Some(user()), vec![pin_north("M", 75.0)]);

        assert_eq!(evaluation.pins()[0].tier, DisplayTier::Mystery);
        assert_eq!(evaluation.discovered().count(), 0);
        assert!(evaluation.discovered_ids().is_empty());
    }

    #[test]
    fn test_band_edges() {
        let engine = DiscoveryEngine::default();
        assert_eq!(engine.classify(19.99, false), Some(DisplayTier::SuperClose));
        assert_eq!(engine.classify(20.0, false), Some(DisplayTier::Close));
        assert_eq!(engine.classify(50.0, false), Some(DisplayTier::Mystery));
        assert_eq!(engine.classify(100.0, false), Some(DisplayTier::Mystery));
        assert_eq!(engine.classify(100.01, false), None);
    }

    #[test]
    fn test_community_pins_reach_further() {
        let engine = DiscoveryEngine::default();
        assert_eq!(engine.classify(10.0, true), Some(DisplayTier::SuperClose));
        assert_eq!(engine.classify(75.0, true), Some(DisplayTier::Community));
        assert_eq!(engine.classify(9_000.0, true), Some(DisplayTier::Community));
        assert_eq!(engine.classify(10_001.0, true), None);

        let evaluation = engine.evaluate(
            Some(user()),
            vec![pin_north("far", 5_000.0).with_community(true)],
        );
        assert_eq!(
            evaluation.discovered_ids().into_iter().collect::<Vec<_>>(),
            vec![PinId::from("far")]
        );
    }

    #[test]
    fn test_no_location_yields_empty() {
        let engine = DiscoveryEngine::default();
        let evaluation = engine.evaluate(None, vec![pin_north("A", 1.0)]);
        assert!(evaluation.is_empty());
        assert!(evaluation.user().is_none());
    }

    #[test]
    fn test_distance_is_always_recomputed() {
        let engine = DiscoveryEngine::default();
        let mut stale = pin_north("A", 500.0);
        stale.distance_m = Some(1.0);

        let evaluation = engine.evaluate(Some(user()), vec![stale]);
        assert!(evaluation.is_empty(), "Supplied distance must be ignored");
    }

    #[test]
    fn test_repeated_evaluation_is_identical() {
        let engine = DiscoveryEngine::default();
        let pins = vec![pin_north("A", 8.0), pin_north("B", 35.0), pin_north("M", 80.0)];

        let first = engine.evaluate(Some(user()), pins.clone());
        let second = engine.evaluate(Some(user()), pins);
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_radius() {
        let engine = DiscoveryEngine::new(
            DiscoveryConfig::default()
                .with_radius(10.0)
                .with_super_close_radius(5.0),
        );
        let evaluation = engine.evaluate(Some(user()), vec![pin_north("B", 15.0)]);
        assert_eq!(evaluation.pins()[0].tier, DisplayTier::Mystery);
    }

    #[test]
    fn test_tier_labels() {
        assert_eq!(DisplayTier::SuperClose.to_string(), "super-close");
        assert_eq!(DisplayTier::SuperClose.marker_color(), "gold");
        assert_eq!(DisplayTier::Close.marker_color(), "plum");
        assert_eq!(DisplayTier::Mystery.marker_color(), "pink");
        assert!(DisplayTier::Community.is_discovered());
        assert!(!DisplayTier::Mystery.is_discovered());
    }
}
