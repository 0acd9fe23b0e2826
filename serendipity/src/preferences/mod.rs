//! Per-pin notification preferences (mute / cooldown).

mod model;
mod store;

pub use model::PinPreference;
pub use store::{PreferenceStore, DEFAULT_COOLDOWN, PREFERENCES_KEY};
