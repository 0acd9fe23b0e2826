//! Pin data model.
//!
//! Pins are created and removed outside this crate. Discovery only ever sees
//! a read-only snapshot refreshed each polling cycle, and never trusts a
//! distance supplied by the pin store.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Opaque pin identity, stable across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(String);

impl PinId {
    /// Create a pin id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PinId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PinId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for PinId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// What a pin carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A short text message.
    #[default]
    Text,
    /// A photo drop.
    Photo,
}

impl ContentKind {
    /// Parse a content type label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "text" => Some(ContentKind::Text),
            "photo" | "image" => Some(ContentKind::Photo),
            _ => None,
        }
    }
}

/// A geotagged message pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// Stable identity.
    pub id: PinId,

    /// Where the pin was dropped.
    pub coordinate: Coordinate,

    /// Text or photo.
    #[serde(default)]
    pub kind: ContentKind,

    /// Distance from the user, filled in by the discovery engine.
    ///
    /// Never read from the pin store.
    #[serde(default, skip_deserializing)]
    pub distance_m: Option<f64>,

    /// Community pins notify across a much wider geofence.
    #[serde(default)]
    pub community: bool,

    /// Hidden by moderation (reports outnumber twice the likes).
    #[serde(default)]
    pub suppressed: bool,
}

impl Pin {
    /// Create a regular text pin.
    pub fn new(id: impl Into<PinId>, coordinate: Coordinate) -> Self {
        Self {
            id: id.into(),
            coordinate,
            kind: ContentKind::Text,
            distance_m: None,
            community: false,
            suppressed: false,
        }
    }

    /// Set the content kind.
    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark as a community pin.
    pub fn with_community(mut self, community: bool) -> Self {
        self.community = community;
        self
    }

    /// Mark as suppressed.
    pub fn with_suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }
}

/// Moderation rule used by the pin store: suppress once reports exceed
/// twice the likes.
pub fn is_suppressed_by_votes(likes: u32, reports: u32) -> bool {
    u64::from(reports) > u64::from(likes) * 2
}
