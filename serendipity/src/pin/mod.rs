//! Pins and the pin store boundary.

mod http;
mod model;
mod source;

pub use http::{
    clamp_query_radius, parse_discover_response, HttpPinSource, DEFAULT_TIMEOUT,
    MAX_QUERY_RADIUS_M, MIN_QUERY_RADIUS_M,
};
pub use model::{is_suppressed_by_votes, ContentKind, Pin, PinId};
pub use source::{PinSource, PinSourceError, StaticPinSource};
