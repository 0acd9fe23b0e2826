//! Pin store boundary.
//!
//! The location update loop asks a [`PinSource`] for the candidates around
//! the user once per cycle. Fetch failures never stop the loop; they are
//! logged and the cycle runs with no candidates.

use std::path::Path;

use parking_lot::RwLock;
use thiserror::Error;

use super::model::{Pin, PinId};
use crate::geo::Coordinate;
use crate::kv::BoxFuture;

/// Errors raised by pin store adapters.
#[derive(Debug, Error)]
pub enum PinSourceError {
    /// Transport failure talking to the remote pin store.
    #[error("Pin store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The pin store answered with a non-success status.
    #[error("Pin store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response or file contents could not be decoded.
    #[error("Failed to decode pins: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading a local pin file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the candidate pins around a location.
pub trait PinSource: Send + Sync {
    /// Fetch pins within `radius_m` meters of `center`.
    ///
    /// Implementations may return pins slightly outside the radius; the
    /// discovery engine filters by its own distance computation.
    fn fetch_pins(
        &self,
        center: Coordinate,
        radius_m: f64,
    ) -> BoxFuture<'_, Result<Vec<Pin>, PinSourceError>>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Pin source over a fixed, replaceable list.
///
/// Returns the whole list regardless of the query; distance filtering is the
/// engine's job.
#[derive(Debug, Default)]
pub struct StaticPinSource {
    pins: RwLock<Vec<Pin>>,
}

impl StaticPinSource {
    /// Create a source over the given pins.
    pub fn new(pins: Vec<Pin>) -> Self {
        Self {
            pins: RwLock::new(pins),
        }
    }

    /// Parse a JSON array of pins.
    pub fn from_json(json: &str) -> Result<Self, PinSourceError> {
        let pins: Vec<Pin> = serde_json::from_str(json)?;
        Ok(Self::new(pins))
    }

    /// Load a JSON array of pins from a file.
    pub async fn from_json_file(path: &Path) -> Result<Self, PinSourceError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Replace the whole snapshot.
    pub fn replace(&self, pins: Vec<Pin>) {
        *self.pins.write() = pins;
    }

    /// Remove a pin (deleted or reported away).
    pub fn remove(&self, id: &PinId) -> bool {
        let mut pins = self.pins.write();
        let before = pins.len();
        pins.retain(|p| &p.id != id);
        pins.len() != before
    }

    /// Number of pins held.
    pub fn len(&self) -> usize {
        self.pins.read().len()
    }

    /// Whether the source holds no pins.
    pub fn is_empty(&self) -> bool {
        self.pins.read().is_empty()
    }
}

impl PinSource for StaticPinSource {
    fn fetch_pins(
        &self,
        _center: Coordinate,
        _radius_m: f64,
    ) -> BoxFuture<'_, Result<Vec<Pin>, PinSourceError>> {
        let pins = self.pins.read().clone();
        Box::pin(async move { Ok(pins) })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
