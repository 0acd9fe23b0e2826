//! The location update loop.
//!
//! Drives discovery cycles from two triggers:
//!
//! - **Heartbeat**: a fixed interval, so a stationary user still sees pins
//!   that appear around them.
//! - **Movement**: the walked distance since the last cycle reaches the
//!   movement threshold.
//!
//! The first fix after having none triggers an immediate cycle.
//!
//! # Single flight
//!
//! At most one cycle runs at a time. [`LocationUpdateLoop::try_run_cycle`]
//! claims an atomic guard; a trigger that finds it taken returns
//! [`CycleOutcome::Coalesced`] and is dropped, not queued. Session state is
//! only written inside a cycle, so the guard also makes the loop its sole
//! writer.
//!
//! [`LocationUpdateLoop::run`] claims the guard before spawning a cycle
//! task, and treats a spawned cycle as in flight until its task has been
//! reaped. A heartbeat and a movement fix observed together therefore run
//! one cycle.
//!
//! # Cycle
//!
//! 1. Read the latest fix (none: [`CycleOutcome::NoLocation`])
//! 2. Fetch candidates from the pin source (failure: empty list)
//! 3. Evaluate and fold into the session
//! 4. Emit notifications and pass-bys to the sink
//! 5. Refresh `last_seen` for rated pins discovered in this cycle

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::config::{TrackerConfig, TrackerConfigError};
use super::position::{MovementTrigger, PositionSample};
use super::sink::{NotificationEvent, NotificationSink, PassByEvent};
use crate::discovery::{DiscoveryEngine, DiscoverySession};
use crate::geo::Coordinate;
use crate::pin::{PinId, PinSource};
use crate::preferences::PreferenceStore;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// First fix after having none.
    Initial,
    /// Heartbeat interval elapsed.
    Heartbeat,
    /// Movement threshold reached.
    Movement,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Initial => write!(f, "initial"),
            Trigger::Heartbeat => write!(f, "heartbeat"),
            Trigger::Movement => write!(f, "movement"),
        }
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// What started the cycle.
    pub trigger: Trigger,
    /// Position the cycle evaluated from.
    pub position: Coordinate,
    /// Candidates returned by the pin source.
    pub candidates: usize,
    /// Pins currently inside the discovery radius.
    pub in_radius: usize,
    /// Pins that notified in this cycle.
    pub notified: Vec<PinId>,
    /// Pins walked past in this cycle.
    pub pass_bys: Vec<PinId>,
    /// Whether the pin source failed (and the cycle ran with no candidates).
    pub source_failed: bool,
}

/// Result of asking for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The cycle ran.
    Completed(CycleReport),
    /// Another cycle was in flight; this trigger was dropped.
    Coalesced,
    /// No position fix yet.
    NoLocation,
}

/// Counters for the lifetime of a loop.
#[derive(Debug, Default)]
struct LoopCounters {
    cycles: AtomicU64,
    coalesced: AtomicU64,
    notifications: AtomicU64,
    pass_bys: AtomicU64,
    source_failures: AtomicU64,
}

/// Point-in-time copy of the loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Completed cycles.
    pub cycles: u64,
    /// Triggers dropped because a cycle was in flight.
    pub coalesced: u64,
    /// Notifications emitted.
    pub notifications: u64,
    /// Pass-bys emitted.
    pub pass_bys: u64,
    /// Cycles that ran without candidates because the source failed.
    pub source_failures: u64,
}

/// Clears the in-flight flag when a cycle ends, including when its task is
/// aborted.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Location-driven discovery loop.
///
/// # Example
///
/// ```ignore
/// let update_loop = Arc::new(LocationUpdateLoop::new(
///     DiscoveryEngine::default(),
///     TrackerConfig::default(),
///     preferences,
///     pin_source,
///     Arc::new(LoggingSink),
/// )?);
///
/// let (tx, rx) = watch::channel(None);
/// tokio::spawn(Arc::clone(&update_loop).run(rx, cancellation.clone()));
/// tx.send(Some(PositionSample::new(35.0, 139.0, now_ms)))?;
/// ```
pub struct LocationUpdateLoop {
    engine: DiscoveryEngine,
    config: TrackerConfig,
    session: Mutex<DiscoverySession>,
    preferences: Arc<PreferenceStore>,
    source: Arc<dyn PinSource>,
    sink: Arc<dyn NotificationSink>,
    latest: RwLock<Option<PositionSample>>,
    movement: Mutex<MovementTrigger>,
    in_flight: Arc<AtomicBool>,
    counters: LoopCounters,
}

impl std::fmt::Debug for LocationUpdateLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationUpdateLoop")
            .field("config", &self.config)
            .field("source", &self.source.name())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl LocationUpdateLoop {
    /// Create a loop with a fresh session.
    ///
    /// Fails if `config` does not validate, e.g. a zero heartbeat.
    pub fn new(
        engine: DiscoveryEngine,
        config: TrackerConfig,
        preferences: Arc<PreferenceStore>,
        source: Arc<dyn PinSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, TrackerConfigError> {
        config.validate()?;
        let movement = MovementTrigger::new(config.movement_threshold_m);
        Ok(Self {
            engine,
            config,
            session: Mutex::new(DiscoverySession::new()),
            preferences,
            source,
            sink,
            latest: RwLock::new(None),
            movement: Mutex::new(movement),
            in_flight: Arc::new(AtomicBool::new(false)),
            counters: LoopCounters::default(),
        })
    }

    /// Trigger configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The preference store consulted by every cycle.
    pub fn preferences(&self) -> &Arc<PreferenceStore> {
        &self.preferences
    }

    /// Latest position fix.
    pub fn latest_position(&self) -> Option<PositionSample> {
        *self.latest.read()
    }

    /// Whether a cycle is running.
    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run a closure against the session (read-only inspection).
    pub fn with_session<R>(&self, f: impl FnOnce(&DiscoverySession) -> R) -> R {
        f(&self.session.lock())
    }

    /// The user opened a pin; it will not be reported as passed by.
    pub fn mark_opened(&self, id: &PinId) {
        self.session.lock().mark_opened(id);
    }

    /// Copy of the loop counters.
    pub fn stats(&self) -> LoopStats {
        LoopStats {
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            notifications: self.counters.notifications.load(Ordering::Relaxed),
            pass_bys: self.counters.pass_bys.load(Ordering::Relaxed),
            source_failures: self.counters.source_failures.load(Ordering::Relaxed),
        }
    }

    /// Record a position update and decide whether it should trigger a cycle.
    ///
    /// `None` means the fix was lost: the loop goes quiescent until the next
    /// fix, which then triggers [`Trigger::Initial`].
    pub fn handle_sample(&self, sample: Option<PositionSample>) -> Option<Trigger> {
        let Some(sample) = sample else {
            *self.latest.write() = None;
            self.movement.lock().clear();
            return None;
        };

        let had_fix = self.latest.write().replace(sample).is_some();
        let moved = self.movement.lock().record(&sample);

        if !had_fix {
            Some(Trigger::Initial)
        } else if moved {
            Some(Trigger::Movement)
        } else {
            None
        }
    }

    /// Run one discovery cycle unless one is already in flight.
    pub async fn try_run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        let Some(_guard) = self.claim_cycle(trigger) else {
            return CycleOutcome::Coalesced;
        };
        self.run_cycle(trigger).await
    }

    fn claim_cycle(&self, trigger: Trigger) -> Option<InFlightGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.coalesce(trigger);
            return None;
        }
        Some(InFlightGuard(Arc::clone(&self.in_flight)))
    }

    fn coalesce(&self, trigger: Trigger) {
        self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%trigger, "Cycle in flight, trigger dropped");
    }

    async fn run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        let latest = *self.latest.read();
        let Some(sample) = latest else {
            return CycleOutcome::NoLocation;
        };
        let position = sample.coordinate();
        self.movement.lock().reset();

        let query_radius_m = self.engine.config().query_radius_m();
        let (candidates, source_failed) =
            match self.source.fetch_pins(position, query_radius_m).await {
                Ok(pins) => (pins, false),
                Err(e) => {
                    self.counters.source_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        source = self.source.name(),
                        error = %e,
                        "Pin fetch failed, evaluating with no candidates"
                    );
                    (Vec::new(), true)
                }
            };
        let candidate_count = candidates.len();

        let evaluation = self.engine.evaluate(Some(position), candidates);
        let observation = self.session.lock().observe(&evaluation, &self.preferences);

        let mut notified = Vec::new();
        for discovery in observation.notifications() {
            notified.push(discovery.pin_id.clone());
            self.sink.notify(NotificationEvent::from(discovery));
        }
        for id in &observation.pass_bys {
            self.sink.pass_by(PassByEvent { pin_id: id.clone() });
        }

        for discovery in &observation.newly_discovered {
            self.preferences.update_last_seen(&discovery.pin_id).await;
        }

        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        self.counters
            .notifications
            .fetch_add(notified.len() as u64, Ordering::Relaxed);
        self.counters
            .pass_bys
            .fetch_add(observation.pass_bys.len() as u64, Ordering::Relaxed);

        tracing::debug!(
            %trigger,
            position = %position,
            candidates = candidate_count,
            in_radius = observation.in_radius.len(),
            notified = notified.len(),
            pass_bys = observation.pass_bys.len(),
            "Discovery cycle complete"
        );

        CycleOutcome::Completed(CycleReport {
            trigger,
            position,
            candidates: candidate_count,
            in_radius: observation.in_radius.len(),
            notified,
            pass_bys: observation.pass_bys,
            source_failed,
        })
    }

    /// Drive the loop until cancelled or the position channel closes.
    ///
    /// Cycles run on their own tasks so the loop keeps reading fixes while
    /// one is in flight; triggers arriving meanwhile coalesce. When the
    /// channel closes the running cycle is awaited; on cancellation it is
    /// aborted.
    pub async fn run(
        self: Arc<Self>,
        mut positions: watch::Receiver<Option<PositionSample>>,
        cancellation: CancellationToken,
    ) {
        tracing::info!(
            heartbeat_ms = self.config.heartbeat_interval.as_millis() as u64,
            movement_threshold_m = self.config.movement_threshold_m,
            source = self.source.name(),
            "Location update loop started"
        );

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; fixes drive the first cycle
        heartbeat.tick().await;

        let mut cycles = JoinSet::new();

        let current = *positions.borrow_and_update();
        if let Some(trigger) = self.handle_sample(current) {
            self.spawn_cycle(&mut cycles, trigger);
        }

        let cancelled = loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break true,

                changed = positions.changed() => {
                    if changed.is_err() {
                        break false;
                    }
                    let sample = *positions.borrow_and_update();
                    if let Some(trigger) = self.handle_sample(sample) {
                        self.spawn_cycle(&mut cycles, trigger);
                    }
                }

                _ = heartbeat.tick() => {
                    self.spawn_cycle(&mut cycles, Trigger::Heartbeat);
                }

                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!(error = %e, "Discovery cycle task failed");
                    }
                }
            }
        };

        if cancelled {
            cycles.shutdown().await;
        } else {
            while cycles.join_next().await.is_some() {}
        }

        let stats = self.stats();
        tracing::info!(
            cycles = stats.cycles,
            coalesced = stats.coalesced,
            notifications = stats.notifications,
            pass_bys = stats.pass_bys,
            "Location update loop stopped"
        );
    }

    fn spawn_cycle(self: &Arc<Self>, cycles: &mut JoinSet<()>, trigger: Trigger) {
        // A finished cycle still counts until the loop has reaped its task
        if !cycles.is_empty() {
            self.coalesce(trigger);
            return;
        }
        let Some(guard) = self.claim_cycle(trigger) else {
            return;
        };
        let this = Arc::clone(self);
        cycles.spawn(async move {
            let _guard = guard;
            this.run_cycle(trigger).await;
        });
    }
}
