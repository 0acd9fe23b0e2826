//! INI configuration file.
//!
//! Settings live in `~/.serendipity/config.ini`:
//!
//! ```ini
//! [discovery]
//! radius_m = 50
//! super_close_radius_m = 20
//! cutoff_multiplier = 2.0
//! community_radius_m = 10000
//!
//! [tracker]
//! heartbeat_ms = 10000
//! movement_threshold_m = 20
//!
//! [preferences]
//! cooldown_days = 7
//! directory = ~/.serendipity/state
//!
//! [pin_store]
//! base_url = http://localhost:8000
//! timeout_secs = 10
//! device_id = my-phone
//!
//! [logging]
//! file = ~/.serendipity/serendipity.log
//! ```
//!
//! Every key is optional. A missing file yields the defaults; an empty
//! value is treated as unset.

mod file;

pub use file::{
    config_directory, config_file_path, expand_tilde, ConfigError, ConfigFile, LoggingSettings,
    PinStoreSettings, PreferenceSettings,
};
