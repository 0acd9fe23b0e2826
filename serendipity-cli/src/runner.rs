//! Shared command setup: configuration, logging and the async runtime.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serendipity::clock::{Clock, SystemClock};
use serendipity::config::{config_file_path, ConfigFile};
use serendipity::kv::{FileKeyValueStore, KeyValueStore};
use serendipity::logging::{init_logging, LoggingGuard};
use serendipity::preferences::PreferenceStore;

use crate::error::CliError;

/// Everything a command needs before it can do real work.
pub struct CliRunner {
    config: ConfigFile,
    config_path: PathBuf,
    runtime: tokio::runtime::Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load configuration (default path unless overridden), install logging
    /// and start a runtime.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;
        let logging = init_logging(config.logging.file.as_deref())?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            config_path,
            runtime,
            _logging: logging,
        })
    }

    /// Effective configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            version = serendipity::VERSION,
            command,
            config = %self.config_path.display(),
            "Serendipity starting"
        );
    }

    /// Run a future to completion on the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Open the on-disk preference store and load it.
    pub fn preferences(&self) -> Arc<PreferenceStore> {
        let kv = FileKeyValueStore::new(self.config.preferences.directory.clone());
        let store = PreferenceStore::new(
            Arc::new(kv) as Arc<dyn KeyValueStore>,
            Arc::new(SystemClock) as Arc<dyn Clock>,
        )
        .with_cooldown(self.config.preferences.cooldown);
        self.block_on(store.load());
        Arc::new(store)
    }
}
