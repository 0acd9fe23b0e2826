//! Per-session discovery bookkeeping.
//!
//! A [`DiscoverySession`] remembers which pins the user has met since the
//! process started and turns each [`Evaluation`] into the set of newly
//! discovered pins and the notification decision for each.
//!
//! # State Machine
//!
//! ```text
//! Unknown --[enters radius]--> Discovered --[should_notify]--> Notified
//! Notified/Discovered --[leaves radius | should_notify false]--> SeenCooling
//! SeenCooling --[cooldown elapsed | unmuted]--> EligibleAgain
//! EligibleAgain --[forget() then enters radius]--> Discovered
//! ```
//!
//! Session membership is never cleared automatically: a pin that leaves and
//! re-enters the radius in the same session does not notify twice. Only
//! [`DiscoverySession::forget`] re-arms it.
//!
//! # Pending notifications
//!
//! Every pin that notifies is recorded in its own entry of the notified set,
//! so several pins entering the radius in the same cycle all notify.
//! [`DiscoverySession::last_notified`] still reports the most recent one.

use std::collections::HashSet;

use super::engine::{DisplayTier, Evaluation};
use crate::pin::PinId;
use crate::preferences::PreferenceStore;

/// Whether a new discovery should raise a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    /// Notify the user.
    Notify,
    /// The user's preference (mute or cooldown) blocks it.
    Silenced,
    /// Moderation hides the pin from notifications.
    Suppressed,
}

/// Conceptual discovery state of one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Not met in this session.
    Unknown,
    /// Inside the radius; discovered without a notification.
    Discovered,
    /// Inside the radius; a notification fired.
    Notified,
    /// Met earlier and currently not eligible to notify.
    SeenCooling,
    /// Met earlier; preferences would allow a notification again.
    EligibleAgain,
}

/// A pin seen inside the radius for the first time this session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscovery {
    /// The pin.
    pub pin_id: PinId,
    /// Distance when discovered, in meters.
    pub distance_m: f64,
    /// Tier when discovered.
    pub tier: DisplayTier,
    /// Notification decision taken at that instant.
    pub decision: NotifyDecision,
}

impl NewDiscovery {
    /// Whether this discovery notifies.
    pub fn should_notify(&self) -> bool {
        self.decision == NotifyDecision::Notify
    }
}

/// What one evaluation changed in the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Pins discovered for the first time, nearest first.
    pub newly_discovered: Vec<NewDiscovery>,
    /// Pins currently inside the discovery radius, nearest first.
    pub in_radius: Vec<PinId>,
    /// Pins walked past (super-close, never opened, now out of range).
    pub pass_bys: Vec<PinId>,
}

impl Observation {
    /// New discoveries that should notify.
    pub fn notifications(&self) -> impl Iterator<Item = &NewDiscovery> {
        self.newly_discovered.iter().filter(|d| d.should_notify())
    }
}

/// Discovery bookkeeping for one process lifetime.
#[derive(Debug, Default)]
pub struct DiscoverySession {
    /// Every pin met this session.
    discovered: HashSet<PinId>,
    /// Pins that raised a notification this session.
    notified: HashSet<PinId>,
    last_notified: Option<PinId>,
    /// Pins inside the radius at the last evaluation.
    inside: HashSet<PinId>,
    /// Pins armed for pass-by (entered super-close, not opened yet).
    armed: HashSet<PinId>,
    opened: HashSet<PinId>,
    passed_by: HashSet<PinId>,
}

impl DiscoverySession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an evaluation into the session.
    ///
    /// An evaluation without a user position changes nothing.
    pub fn observe(
        &mut self,
        evaluation: &Evaluation,
        preferences: &PreferenceStore,
    ) -> Observation {
        let mut observation = Observation::default();
        if evaluation.user().is_none() {
            return observation;
        }

        let mut now_inside = HashSet::new();

        for evaluated in evaluation.discovered() {
            let id = evaluated.id();
            now_inside.insert(id.clone());
            observation.in_radius.push(id.clone());

            if self.discovered.insert(id.clone()) {
                let decision = if evaluated.pin.suppressed {
                    NotifyDecision::Suppressed
                } else if preferences.should_notify(id) {
                    NotifyDecision::Notify
                } else {
                    NotifyDecision::Silenced
                };

                if decision == NotifyDecision::Notify {
                    self.notified.insert(id.clone());
                    self.last_notified = Some(id.clone());
                }

                tracing::debug!(
                    pin = %id,
                    distance_m = evaluated.distance_m,
                    tier = %evaluated.tier,
                    ?decision,
                    "Pin discovered"
                );

                observation.newly_discovered.push(NewDiscovery {
                    pin_id: id.clone(),
                    distance_m: evaluated.distance_m,
                    tier: evaluated.tier,
                    decision,
                });
            }

            if evaluated.tier == DisplayTier::SuperClose
                && !self.opened.contains(id)
                && !self.passed_by.contains(id)
            {
                self.armed.insert(id.clone());
            }
        }

        let departed: Vec<PinId> = self
            .armed
            .iter()
            .filter(|id| !now_inside.contains(*id))
            .cloned()
            .collect();
        for id in departed {
            self.armed.remove(&id);
            if !self.opened.contains(&id) && self.passed_by.insert(id.clone()) {
                tracing::debug!(pin = %id, "Pin passed by without opening");
                observation.pass_bys.push(id);
            }
        }

        self.inside = now_inside;
        observation
    }

    /// The user opened a pin; it can no longer count as passed by.
    pub fn mark_opened(&mut self, id: &PinId) {
        self.armed.remove(id);
        self.opened.insert(id.clone());
    }

    /// Drop a pin from the session so its next entry counts as new.
    ///
    /// Returns whether the pin had been discovered.
    pub fn forget(&mut self, id: &PinId) -> bool {
        self.notified.remove(id);
        self.inside.remove(id);
        self.armed.remove(id);
        if self.last_notified.as_ref() == Some(id) {
            self.last_notified = None;
        }
        self.discovered.remove(id)
    }

    /// Whether the pin was met this session.
    pub fn is_discovered(&self, id: &PinId) -> bool {
        self.discovered.contains(id)
    }

    /// Whether the pin notified this session.
    pub fn is_notified(&self, id: &PinId) -> bool {
        self.notified.contains(id)
    }

    /// The most recently notified pin.
    pub fn last_notified(&self) -> Option<&PinId> {
        self.last_notified.as_ref()
    }

    /// Number of pins met this session.
    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    /// Number of pins that notified this session.
    pub fn notified_count(&self) -> usize {
        self.notified.len()
    }

    /// Current conceptual state of a pin.
    pub fn pin_state(&self, id: &PinId, preferences: &PreferenceStore) -> PinState {
        if !self.discovered.contains(id) {
            return PinState::Unknown;
        }
        let inside = self.inside.contains(id);
        if inside && self.notified.contains(id) {
            PinState::Notified
        } else if inside {
            PinState::Discovered
        } else if preferences.should_notify(id) {
            PinState::EligibleAgain
        } else {
            PinState::SeenCooling
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::discovery::DiscoveryEngine;
    use crate::geo::Coordinate;
    use crate::kv::{KeyValueStore, MemoryKeyValueStore};
    use crate::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    const M_PER_DEG_LAT: f64 = 111_194.93;

    fn user_at(meters_north: f64) -> Option<Coordinate> {
        Some(Coordinate::new(35.0 + meters_north / M_PER_DEG_LAT, 139.0))
    }

    fn pin_north(id: &str, meters: f64) -> Pin {
        Pin::new(id, Coordinate::new(35.0 + meters / M_PER_DEG_LAT, 139.0))
    }

    fn preferences() -> (PreferenceStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = PreferenceStore::new(
            Arc::new(MemoryKeyValueStore::new()) as Arc<dyn KeyValueStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (store, clock)
    }

    #[tokio::test]
    async fn test_first_entry_notifies_once() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        let mut session = DiscoverySession::new();
        let pins = vec![pin_north("A", 8.0), pin_north("B", 35.0)];

        let evaluation = engine.evaluate(user_at(0.0), pins.clone());
        let first = session.observe(&evaluation, &prefs);
        assert_eq!(first.notifications().count(), 2, "Both pins notify");
        assert_eq!(session.notified_count(), 2);
        assert_eq!(session.last_notified(), Some(&PinId::from("B")));

        // Same location, same pins: nothing new
        let evaluation = engine.evaluate(user_at(0.0), pins);
        let second = session.observe(&evaluation, &prefs);
        assert!(second.newly_discovered.is_empty());
        assert_eq!(second.in_radius, first.in_radius);
    }

    #[tokio::test]
    async fn test_reentry_in_same_session_does_not_renotify() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        let mut session = DiscoverySession::new();
        let pins = vec![pin_north("B", 35.0)];

        session.observe(&engine.evaluate(user_at(0.0), pins.clone()), &prefs);
        // Walk 200 m away, then come back
        session.observe(&engine.evaluate(user_at(-200.0), pins.clone()), &prefs);
        let back = session.observe(&engine.evaluate(user_at(0.0), pins), &prefs);

        assert!(back.newly_discovered.is_empty());
        assert!(session.is_discovered(&PinId::from("B")));
    }

    #[tokio::test]
    async fn test_preferences_gate_notification() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        prefs.mark_bad(&PinId::from("muted")).await;
        prefs.mark_good(&PinId::from("cooling")).await;

        let mut session = DiscoverySession::new();
        let evaluation = engine.evaluate(
            user_at(0.0),
            vec![
                pin_north("muted", 5.0),
                pin_north("cooling", 10.0),
                pin_north("fresh", 15.0),
            ],
        );
        let observation = session.observe(&evaluation, &prefs);

        let decisions: Vec<(String, NotifyDecision)> = observation
            .newly_discovered
            .iter()
            .map(|d| (d.pin_id.to_string(), d.decision))
            .collect();
        assert_eq!(
            decisions,
            vec![
                ("muted".to_string(), NotifyDecision::Silenced),
                ("cooling".to_string(), NotifyDecision::Silenced),
                ("fresh".to_string(), NotifyDecision::Notify),
            ]
        );
        assert_eq!(
            session.pin_state(&PinId::from("muted"), &prefs),
            PinState::Discovered
        );
        assert_eq!(
            session.pin_state(&PinId::from("fresh"), &prefs),
            PinState::Notified
        );
    }

    #[tokio::test]
    async fn test_suppressed_pin_never_notifies() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        let mut session = DiscoverySession::new();

        let evaluation = engine.evaluate(
            user_at(0.0),
            vec![pin_north("S", 5.0).with_suppressed(true)],
        );
        let observation = session.observe(&evaluation, &prefs);
        assert_eq!(
            observation.newly_discovered[0].decision,
            NotifyDecision::Suppressed
        );
        assert_eq!(observation.notifications().count(), 0);
    }

    #[tokio::test]
    async fn test_state_machine_through_cooldown_and_forget() {
        let engine = DiscoveryEngine::default();
        let (prefs, clock) = preferences();
        let mut session = DiscoverySession::new();
        let id = PinId::from("A");
        let pins = vec![pin_north("A", 8.0)];

        assert_eq!(session.pin_state(&id, &prefs), PinState::Unknown);

        session.observe(&engine.evaluate(user_at(0.0), pins.clone()), &prefs);
        assert_eq!(session.pin_state(&id, &prefs), PinState::Notified);

        prefs.mark_good(&id).await;
        session.observe(&engine.evaluate(user_at(-300.0), pins.clone()), &prefs);
        assert_eq!(session.pin_state(&id, &prefs), PinState::SeenCooling);

        clock.advance(Duration::from_secs(7 * 24 * 60 * 60 + 1));
        assert_eq!(session.pin_state(&id, &prefs), PinState::EligibleAgain);

        // Still a member of the session: re-entry is silent until forgotten
        let again = session.observe(&engine.evaluate(user_at(0.0), pins.clone()), &prefs);
        assert!(again.newly_discovered.is_empty());

        assert!(session.forget(&id));
        assert!(session.last_notified().is_none());
        session.observe(&engine.evaluate(user_at(-300.0), pins.clone()), &prefs);
        let renewed = session.observe(&engine.evaluate(user_at(0.0), pins), &prefs);
        assert_eq!(renewed.notifications().count(), 1);
    }

    #[tokio::test]
    async fn test_pass_by_fires_once_when_leaving_unopened() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        let mut session = DiscoverySession::new();
        let pins = vec![pin_north("A", 0.0)];

        session.observe(&engine.evaluate(user_at(10.0), pins.clone()), &prefs);
        // Still inside the radius (close tier): no pass-by yet
        let near = session.observe(&engine.evaluate(user_at(30.0), pins.clone()), &prefs);
        assert!(near.pass_bys.is_empty());

        let gone = session.observe(&engine.evaluate(user_at(80.0), pins.clone()), &prefs);
        assert_eq!(gone.pass_bys, vec![PinId::from("A")]);

        // Back and away again: already counted
        session.observe(&engine.evaluate(user_at(5.0), pins.clone()), &prefs);
        let again = session.observe(&engine.evaluate(user_at(80.0), pins), &prefs);
        assert!(again.pass_bys.is_empty());
    }

    #[tokio::test]
    async fn test_opened_pin_is_not_passed_by() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        let mut session = DiscoverySession::new();
        let pins = vec![pin_north("A", 0.0)];

        session.observe(&engine.evaluate(user_at(5.0), pins.clone()), &prefs);
        session.mark_opened(&PinId::from("A"));
        let gone = session.observe(&engine.evaluate(user_at(80.0), pins), &prefs);
        assert!(gone.pass_bys.is_empty());
    }

    #[tokio::test]
    async fn test_missing_location_keeps_state() {
        let engine = DiscoveryEngine::default();
        let (prefs, _) = preferences();
        let mut session = DiscoverySession::new();
        let pins = vec![pin_north("A", 0.0)];

        session.observe(&engine.evaluate(user_at(5.0), pins.clone()), &prefs);
        let blind = session.observe(&engine.evaluate(None, pins), &prefs);
        assert_eq!(blind, Observation::default());
        assert_eq!(
            session.pin_state(&PinId::from("A"), &prefs),
            PinState::Notified
        );
    }
}
