//! Notification delivery boundary.
//!
//! The loop hands each event to a [`NotificationSink`] synchronously and
//! does not wait for delivery. Sinks that need I/O should forward the event
//! to a task of their own; [`ChannelSink`] does exactly that.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::discovery::{DisplayTier, NewDiscovery};
use crate::pin::PinId;

/// A discovery the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// The discovered pin.
    pub pin_id: PinId,
    /// Distance at discovery, rounded to whole meters.
    pub distance_m: u32,
    /// Tier at discovery.
    #[serde(serialize_with = "serialize_tier")]
    pub tier: DisplayTier,
}

fn serialize_tier<S: serde::Serializer>(tier: &DisplayTier, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(tier.as_str())
}

impl From<&NewDiscovery> for NotificationEvent {
    fn from(discovery: &NewDiscovery) -> Self {
        Self {
            pin_id: discovery.pin_id.clone(),
            distance_m: round_meters(discovery.distance_m),
            tier: discovery.tier,
        }
    }
}

/// The user walked past a pin without opening it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassByEvent {
    /// The pin walked past.
    pub pin_id: PinId,
}

/// Round a non-negative distance to whole meters.
fn round_meters(distance_m: f64) -> u32 {
    // `as` saturates; NaN maps to 0
    distance_m.max(0.0).round() as u32
}

/// Receives events produced by the location update loop.
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification.
    fn notify(&self, event: NotificationEvent);

    /// Record a pass-by.
    fn pass_by(&self, event: PassByEvent);
}

/// Event forwarded by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Notification(NotificationEvent),
    PassBy(PassByEvent),
}

/// Sink forwarding every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Notification receiver dropped, discarding event");
        }
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: NotificationEvent) {
        self.send(SinkEvent::Notification(event));
    }

    fn pass_by(&self, event: PassByEvent) {
        self.send(SinkEvent::PassBy(event));
    }
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn notify(&self, event: NotificationEvent) {
        tracing::info!(
            pin = %event.pin_id,
            distance_m = event.distance_m,
            tier = %event.tier,
            "Hidden message nearby"
        );
    }

    fn pass_by(&self, event: PassByEvent) {
        tracing::info!(pin = %event.pin_id, "Walked past hidden message");
    }
}
