//! Discovery radius and tier thresholds.

use thiserror::Error;

/// Default discovery radius in meters.
pub const DEFAULT_RADIUS_M: f64 = 50.0;

/// Default inner "super close" radius in meters.
///
/// Also the pass-by threshold: walking this close without opening the pin
/// counts as passing it by.
pub const DEFAULT_SUPER_CLOSE_RADIUS_M: f64 = 20.0;

/// Default visibility cutoff as a multiple of the discovery radius.
pub const DEFAULT_CUTOFF_MULTIPLIER: f64 = 2.0;

/// Default geofence for community pins in meters (10 km).
///
/// The HTTP pin store caps queries at
/// [`MAX_QUERY_RADIUS_M`](crate::pin::MAX_QUERY_RADIUS_M) (2 km), so against
/// that backend community pins further than 2 km are never returned.
pub const DEFAULT_COMMUNITY_RADIUS_M: f64 = 10_000.0;

/// A discovery threshold the engine cannot tier with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscoveryConfigError {
    #[error("radius must be positive, got {radius_m}")]
    InvalidRadius { radius_m: f64 },

    #[error("super-close radius must be in (0, {radius_m}], got {super_close_radius_m}")]
    InvalidSuperCloseRadius {
        radius_m: f64,
        super_close_radius_m: f64,
    },

    #[error("cutoff multiplier must be at least 1, got {multiplier}")]
    InvalidCutoffMultiplier { multiplier: f64 },

    #[error("community radius must not be negative, got {radius_m}")]
    InvalidCommunityRadius { radius_m: f64 },
}

/// Configuration for the discovery engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Pins closer than this are discovered.
    pub radius_m: f64,

    /// Pins closer than this are in the super-close tier.
    pub super_close_radius_m: f64,

    /// Pins beyond `radius_m * cutoff_multiplier` are dropped entirely.
    pub cutoff_multiplier: f64,

    /// Community pins stay visible and discovered out to this distance.
    pub community_radius_m: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_M,
            super_close_radius_m: DEFAULT_SUPER_CLOSE_RADIUS_M,
            cutoff_multiplier: DEFAULT_CUTOFF_MULTIPLIER,
            community_radius_m: DEFAULT_COMMUNITY_RADIUS_M,
        }
    }
}

impl DiscoveryConfig {
    /// Set the discovery radius.
    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Set the super-close radius.
    pub fn with_super_close_radius(mut self, radius_m: f64) -> Self {
        self.super_close_radius_m = radius_m;
        self
    }

    /// Set the visibility cutoff multiplier.
    pub fn with_cutoff_multiplier(mut self, multiplier: f64) -> Self {
        self.cutoff_multiplier = multiplier;
        self
    }

    /// Set the community geofence.
    pub fn with_community_radius(mut self, radius_m: f64) -> Self {
        self.community_radius_m = radius_m;
        self
    }

    /// Hard visibility cutoff for regular pins.
    pub fn visibility_cutoff_m(&self) -> f64 {
        self.radius_m * self.cutoff_multiplier
    }

    /// Radius to request from the pin store so nothing visible is missed.
    pub fn query_radius_m(&self) -> f64 {
        self.visibility_cutoff_m().max(self.community_radius_m)
    }

    /// Check the thresholds are usable.
    pub fn validate(&self) -> Result<(), DiscoveryConfigError> {
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            return Err(DiscoveryConfigError::InvalidRadius {
                radius_m: self.radius_m,
            });
        }
        if !(self.super_close_radius_m > 0.0 && self.super_close_radius_m <= self.radius_m) {
            return Err(DiscoveryConfigError::InvalidSuperCloseRadius {
                radius_m: self.radius_m,
                super_close_radius_m: self.super_close_radius_m,
            });
        }
        if !(self.cutoff_multiplier.is_finite() && self.cutoff_multiplier >= 1.0) {
            return Err(DiscoveryConfigError::InvalidCutoffMultiplier {
                multiplier: self.cutoff_multiplier,
            });
        }
        if !(self.community_radius_m.is_finite() && self.community_radius_m >= 0.0) {
            return Err(DiscoveryConfigError::InvalidCommunityRadius {
                radius_m: self.community_radius_m,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.radius_m, 50.0);
        assert_eq!(config.super_close_radius_m, 20.0);
        assert_eq!(config.visibility_cutoff_m(), 100.0);
        assert_eq!(config.query_radius_m(), 10_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DiscoveryConfig::default()
            .with_radius(30.0)
            .with_super_close_radius(10.0)
            .with_cutoff_multiplier(3.0)
            .with_community_radius(0.0);
        assert_eq!(config.visibility_cutoff_m(), 90.0);
        assert_eq!(config.query_radius_m(), 90.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        assert_eq!(
            DiscoveryConfig::default().with_radius(0.0).validate(),
            Err(DiscoveryConfigError::InvalidRadius { radius_m: 0.0 })
        );
        assert_eq!(
            DiscoveryConfig::default()
                .with_super_close_radius(60.0)
                .validate(),
            Err(DiscoveryConfigError::InvalidSuperCloseRadius {
                radius_m: 50.0,
                super_close_radius_m: 60.0,
            })
        );
        assert!(matches!(
            DiscoveryConfig::default()
                .with_cutoff_multiplier(0.5)
                .validate(),
            Err(DiscoveryConfigError::InvalidCutoffMultiplier { .. })
        ));
        assert!(matches!(
            DiscoveryConfig::default()
                .with_community_radius(-1.0)
                .validate(),
            Err(DiscoveryConfigError::InvalidCommunityRadius { .. })
        ));

        let message = DiscoveryConfig::default()
            .with_radius(0.0)
            .validate()
            .unwrap_err()
            .to_string();
        assert_eq!(message, "radius must be positive, got 0");
    }
}
