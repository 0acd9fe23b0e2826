//! HTTP adapter for the remote pin store.
//!
//! Talks to the discovery backend:
//!
//! - `GET {base}/discover?lat=..&lon=..&radius=..` → `{ "pins": [...], ... }`
//! - `POST {base}/pin/{id}/passby` → `{ "passes_by": n, ... }`
//!
//! The backend rejects radii outside 10..=2000 m, so requests are clamped.
//! The default community geofence (10 km) exceeds that cap; the first
//! clamped request logs a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::model::{is_suppressed_by_votes, ContentKind, Pin, PinId};
use super::source::{PinSource, PinSourceError};
use crate::geo::Coordinate;
use crate::kv::BoxFuture;

/// Smallest radius the backend accepts, in meters.
pub const MIN_QUERY_RADIUS_M: f64 = 10.0;

/// Largest radius the backend accepts, in meters.
///
/// Pins further away than this are never returned, community pins included.
pub const MAX_QUERY_RADIUS_M: f64 = 2000.0;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the device identity.
const DEVICE_ID_HEADER: &str = "X-Device-ID";

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    pins: Vec<WirePin>,
}

#[derive(Debug, Deserialize)]
struct WirePin {
    id: i64,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    likes: u32,
    #[serde(default)]
    reports: u32,
    #[serde(default)]
    is_suppressed: Option<bool>,
    #[serde(default)]
    is_community: bool,
    #[serde(default)]
    content_type: Option<String>,
}

impl From<WirePin> for Pin {
    fn from(wire: WirePin) -> Self {
        let suppressed = wire
            .is_suppressed
            .unwrap_or_else(|| is_suppressed_by_votes(wire.likes, wire.reports));
        let kind = wire
            .content_type
            .as_deref()
            .and_then(ContentKind::from_label)
            .unwrap_or_default();

        Pin::new(wire.id, Coordinate::new(wire.latitude, wire.longitude))
            .with_kind(kind)
            .with_community(wire.is_community)
            .with_suppressed(suppressed)
    }
}

#[derive(Debug, Deserialize)]
struct PassByResponse {
    #[serde(default)]
    passes_by: u32,
}

/// Decode a `/discover` response body into pins.
pub fn parse_discover_response(body: &str) -> Result<Vec<Pin>, PinSourceError> {
    let response: DiscoverResponse = serde_json::from_str(body)?;
    Ok(response.pins.into_iter().map(Pin::from).collect())
}

/// Clamp a query radius to what the backend accepts, rounded to whole meters.
pub fn clamp_query_radius(radius_m: f64) -> u32 {
    radius_m
        .clamp(MIN_QUERY_RADIUS_M, MAX_QUERY_RADIUS_M)
        .round() as u32
}

/// Remote pin store client.
#[derive(Debug, Clone)]
pub struct HttpPinSource {
    client: reqwest::Client,
    base_url: String,
    device_id: Option<String>,
    clamp_warned: Arc<AtomicBool>,
}

impl HttpPinSource {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PinSourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device_id: None,
            clamp_warned: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Identify requests with a device id (needed for pass-by attribution).
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Warn the first time a query is cut down to [`MAX_QUERY_RADIUS_M`].
    ///
    /// Returns whether this call logged.
    fn warn_if_clamped(&self, radius_m: f64) -> bool {
        if radius_m <= MAX_QUERY_RADIUS_M || self.clamp_warned.swap(true, Ordering::Relaxed) {
            return false;
        }
        tracing::warn!(
            requested_m = radius_m,
            max_m = MAX_QUERY_RADIUS_M,
            "Query radius exceeds the pin store limit, pins beyond it are not fetched"
        );
        true
    }

    fn discover_url(&self) -> String {
        format!("{}/discover", self.base_url)
    }

    fn pass_by_url(&self, id: &PinId) -> String {
        format!("{}/pin/{}/passby", self.base_url, id)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, PinSourceError> {
        let request = match &self.device_id {
            Some(device_id) => request.header(DEVICE_ID_HEADER, device_id),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PinSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Record that the user walked past a pin without opening it.
    ///
    /// Returns the pin's updated pass-by count.
    pub async fn record_pass_by(&self, id: &PinId) -> Result<u32, PinSourceError> {
        let body = self.send(self.client.post(self.pass_by_url(id))).await?;
        let response: PassByResponse = serde_json::from_str(&body)?;
        tracing::debug!(pin = %id, passes_by = response.passes_by, "Pass-by recorded");
        Ok(response.passes_by)
    }
}

impl PinSource for HttpPinSource {
    fn fetch_pins(
        &self,
        center: Coordinate,
        radius_m: f64,
    ) -> BoxFuture<'_, Result<Vec<Pin>, PinSourceError>> {
        Box::pin(async move {
            self.warn_if_clamped(radius_m);
            let radius = clamp_query_radius(radius_m);
            let request = self.client.get(self.discover_url()).query(&[
                ("lat", center.latitude.to_string()),
                ("lon", center.longitude.to_string()),
                ("radius", radius.to_string()),
            ]);
            let body = self.send(request).await?;
            let pins = parse_discover_response(&body)?;
            tracing::debug!(count = pins.len(), radius_m = radius, "Fetched pins");
            Ok(pins)
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCOVER_BODY: &str = r#"{
        "pins": [
            {
                "id": 7,
                "content": "hello",
                "latitude": 35.0001,
                "longitude": 139.0,
                "distance_meters": 11.1,
                "likes": 1,
                "dislikes": 0,
                "reports": 0,
                "passes_by": 3,
                "is_suppressed": false,
                "is_community": true,
                "is_own_pin": false,
                "expires_at": "2035-01-01T00:00:00"
            },
            {
                "id": 8,
                "content": "spam",
                "latitude": 35.0,
                "longitude": 139.0002,
                "distance_meters": 18.2,
                "likes": 0,
                "dislikes": 4,
                "reports": 2,
                "is_community": false,
                "expires_at": "2035-01-01T00:00:00"
            }
        ],
        "count": 2,
        "message": "Found 2 hidden message(s) nearby!"
    }"#;

    #[test]
    fn test_parse_discover_response() {
        let pins = parse_discover_response(DISCOVER_BODY).unwrap();
        assert_eq!(pins.len(), 2);

        assert_eq!(pins[0].id, PinId::from("7"));
        assert!(pins[0].community);
        assert!(!pins[0].suppressed);
        assert_eq!(pins[0].kind, ContentKind::Text);
        // Backend distance is never trusted
        assert!(pins[0].distance_m.is_none());

        // Missing is_suppressed falls back to the vote rule
        assert!(pins[1].suppressed);
    }

    #[test]
    fn test_parse_discover_response_rejects_garbage() {
        assert!(matches!(
            parse_discover_response("<html>"),
            Err(PinSourceError::Decode(_))
        ));
    }

    #[test]
    fn test_clamp_query_radius() {
        assert_eq!(clamp_query_radius(1.0), 10);
        assert_eq!(clamp_query_radius(100.4), 100);
        assert_eq!(clamp_query_radius(10_000.0), 2000);
    }

    #[test]
    fn test_community_radius_clamp_warns_once() {
        let default_query = crate::discovery::DiscoveryConfig::default().query_radius_m();
        assert_eq!(clamp_query_radius(default_query), 2000);

        let source = HttpPinSource::new("http://localhost:8000", DEFAULT_TIMEOUT).unwrap();
        assert!(!source.warn_if_clamped(MAX_QUERY_RADIUS_M));
        assert!(source.warn_if_clamped(default_query));
        assert!(!source.warn_if_clamped(default_query));

        // Clones share the flag
        assert!(!source.clone().warn_if_clamped(default_query));
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let source = HttpPinSource::new("http://localhost:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(source.base_url(), "http://localhost:8000");
        assert_eq!(source.discover_url(), "http://localhost:8000/discover");
        assert_eq!(
            source.pass_by_url(&PinId::from("7")),
            "http://localhost:8000/pin/7/passby"
        );
        assert_eq!(source.name(), "http");
    }
}
