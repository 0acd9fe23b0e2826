//! Proximity discovery.
//!
//! Two halves:
//!
//! - [`DiscoveryEngine`]: pure tiering of candidate pins by great-circle
//!   distance from the user.
//! - [`DiscoverySession`]: process-lifetime memory of met pins, deciding
//!   which discoveries notify (consulting the
//!   [`PreferenceStore`](crate::preferences::PreferenceStore)) and which pins
//!   were walked past.
//!
//! # Example
//!
//! ```ignore
//! let engine = DiscoveryEngine::new(DiscoveryConfig::default());
//! let mut session = DiscoverySession::new();
//!
//! let evaluation = engine.evaluate(Some(user), pins);
//! let observation = session.observe(&evaluation, &preferences);
//! for discovery in observation.notifications() {
//!     println!("Found {} at {:.0} m", discovery.pin_id, discovery.distance_m);
//! }
//! ```

mod config;
mod engine;
mod session;

pub use config::{
    DiscoveryConfig, DiscoveryConfigError, DEFAULT_COMMUNITY_RADIUS_M, DEFAULT_CUTOFF_MULTIPLIER,
    DEFAULT_RADIUS_M, DEFAULT_SUPER_CLOSE_RADIUS_M,
};
pub use engine::{DiscoveryEngine, DisplayTier, EvaluatedPin, Evaluation};
pub use session::{DiscoverySession, NewDiscovery, NotifyDecision, Observation, PinState};
