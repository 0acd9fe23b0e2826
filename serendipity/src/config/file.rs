//! Loading and rendering `config.ini`.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::discovery::{DiscoveryConfig, DiscoveryConfigError};
use crate::pin::DEFAULT_TIMEOUT;
use crate::preferences::DEFAULT_COOLDOWN;
use crate::tracker::{TrackerConfig, TrackerConfigError};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A key holds a value of the wrong type.
    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// `[discovery]` values parse but cannot tier pins.
    #[error("Invalid [discovery] configuration: {0}")]
    Discovery(#[from] DiscoveryConfigError),

    /// `[tracker]` values parse but cannot drive the loop.
    #[error("Invalid [tracker] configuration: {0}")]
    Tracker(#[from] TrackerConfigError),
}

/// `[preferences]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceSettings {
    /// Re-notification cooldown after rating a pin "Good".
    pub cooldown: Duration,
    /// Directory holding persisted preference state.
    pub directory: PathBuf,
}

impl Default for PreferenceSettings {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            directory: config_directory().join("state"),
        }
    }
}

/// `[pin_store]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PinStoreSettings {
    /// Base URL of the remote pin store; unset means local pins only.
    pub base_url: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Device identifier sent with each request.
    pub device_id: Option<String>,
}

impl Default for PinStoreSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            device_id: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggingSettings {
    /// Log file; unset means stderr only.
    pub file: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub discovery: DiscoveryConfig,
    pub tracker: TrackerConfig,
    pub preferences: PreferenceSettings,
    pub pin_store: PinStoreSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse INI text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // [discovery]
        if let Some(v) = parse_value(ini, "discovery", "radius_m")? {
            config.discovery.radius_m = v;
        }
        if let Some(v) = parse_value(ini, "discovery", "super_close_radius_m")? {
            config.discovery.super_close_radius_m = v;
        }
        if let Some(v) = parse_value(ini, "discovery", "cutoff_multiplier")? {
            config.discovery.cutoff_multiplier = v;
        }
        if let Some(v) = parse_value(ini, "discovery", "community_radius_m")? {
            config.discovery.community_radius_m = v;
        }

        // [tracker]
        if let Some(ms) = parse_value::<u64>(ini, "tracker", "heartbeat_ms")? {
            config.tracker.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(v) = parse_value(ini, "tracker", "movement_threshold_m")? {
            config.tracker.movement_threshold_m = v;
        }

        // [preferences]
        if let Some(days) = parse_value::<u64>(ini, "preferences", "cooldown_days")? {
            config.preferences.cooldown =
                Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY));
        }
        if let Some(dir) = get_value(ini, "preferences", "directory") {
            config.preferences.directory = expand_tilde(dir);
        }

        // [pin_store]
        config.pin_store.base_url = get_value(ini, "pin_store", "base_url").map(str::to_string);
        if let Some(secs) = parse_value::<u64>(ini, "pin_store", "timeout_secs")? {
            config.pin_store.timeout = Duration::from_secs(secs);
        }
        config.pin_store.device_id = get_value(ini, "pin_store", "device_id").map(str::to_string);

        // [logging]
        config.logging.file = get_value(ini, "logging", "file").map(expand_tilde);

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.discovery.validate()?;
        self.tracker.validate()?;
        Ok(())
    }

    /// Render the effective configuration as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("discovery"))
            .set("radius_m", self.discovery.radius_m.to_string())
            .set(
                "super_close_radius_m",
                self.discovery.super_close_radius_m.to_string(),
            )
            .set(
                "cutoff_multiplier",
                self.discovery.cutoff_multiplier.to_string(),
            )
            .set(
                "community_radius_m",
                self.discovery.community_radius_m.to_string(),
            );
        ini.with_section(Some("tracker"))
            .set(
                "heartbeat_ms",
                self.tracker.heartbeat_interval.as_millis().to_string(),
            )
            .set(
                "movement_threshold_m",
                self.tracker.movement_threshold_m.to_string(),
            );
        ini.with_section(Some("preferences"))
            .set(
                "cooldown_days",
                (self.preferences.cooldown.as_secs() / SECONDS_PER_DAY).to_string(),
            )
            .set(
                "directory",
                self.preferences.directory.display().to_string(),
            );
        ini.with_section(Some("pin_store"))
            .set(
                "base_url",
                self.pin_store.base_url.clone().unwrap_or_default(),
            )
            .set("timeout_secs", self.pin_store.timeout.as_secs().to_string())
            .set(
                "device_id",
                self.pin_store.device_id.clone().unwrap_or_default(),
            );
        ini.with_section(Some("logging")).set(
            "file",
            self.logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );

        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Raw value of `key` in `section`, with empty values treated as unset.
fn get_value<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_value<T>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = get_value(ini, section, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Directory holding configuration and local state (`~/.serendipity`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".serendipity")
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
