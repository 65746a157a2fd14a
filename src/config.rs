//! Configuration system for xv.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **User config file** - `~/.config/xv/config.toml` (or `--config`)
//! 3. **Environment variables** - `XV_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! store = "~/.local/share/xv/store"
//! profile_store = "~/.local/share/xv/profiles"
//!
//! [import]
//! workers = 8
//! queue_capacity = 32
//! deadline_hours = 48
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, XvError};
use crate::logging::LogConfig;
use crate::pipeline::{DEFAULT_DEADLINE_HOURS, DEFAULT_QUEUE_CAPACITY, PipelineOptions};

/// Main configuration structure for xv.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path-related configuration.
    pub paths: PathsConfig,
    /// Import behavior configuration.
    pub import: ImportConfig,
    /// Logging defaults.
    pub logging: LoggingConfig,
}

/// Store location configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the main store directory.
    /// Environment variable: `XV_STORE`
    pub store: Option<PathBuf>,

    /// Path to the profile side-table store directory.
    /// Environment variable: `XV_PROFILE_STORE`
    pub profile_store: Option<PathBuf>,
}

/// Import behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Number of decode worker threads (0 = one per CPU).
    /// Environment variable: `XV_WORKERS`
    pub workers: usize,

    /// Completion queue capacity between workers and the import loop.
    /// Environment variable: `XV_QUEUE_CAPACITY`
    pub queue_capacity: usize,

    /// Overall run deadline in hours.
    /// Environment variable: `XV_DEADLINE_HOURS`
    pub deadline_hours: u64,
}

/// Logging defaults, overridable by `--verbose`/`--quiet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level: error, warn, info, debug, trace, off.
    /// Environment variable: `XV_LOG`
    pub level: String,

    /// Log output format: pretty, compact, full.
    pub format: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: 0, // Auto-detect
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            deadline_hours: DEFAULT_DEADLINE_HOURS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. User config file (~/.config/xv/config.toml)
    /// 3. Compiled defaults
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        config.apply_env_overrides();

        debug!("Configuration loaded: {:?}", config);
        config
    }

    /// Load configuration, preferring an explicitly named file.
    ///
    /// With an explicit path the file must exist and parse; the standard
    /// user config file is skipped entirely.
    ///
    /// # Errors
    ///
    /// Fails when the explicit file cannot be read or parsed.
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let Some(path) = explicit else {
            return Ok(Self::load());
        };

        let content = std::fs::read_to_string(path)
            .map_err(|e| XvError::config(path, e.to_string()))?;
        let file: Self =
            toml::from_str(&content).map_err(|e| XvError::config(path, e.to_string()))?;

        let mut config = Self::default();
        config.merge(file);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file, warning instead of failing.
    #[must_use]
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from: {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load the user configuration file from the standard location.
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("xv").join("config.toml"))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(store) = std::env::var("XV_STORE") {
            self.paths.store = Some(PathBuf::from(store));
        }
        if let Ok(profiles) = std::env::var("XV_PROFILE_STORE") {
            self.paths.profile_store = Some(PathBuf::from(profiles));
        }

        if let Ok(workers) = std::env::var("XV_WORKERS") {
            if let Ok(n) = workers.parse() {
                self.import.workers = n;
            }
        }
        if let Ok(capacity) = std::env::var("XV_QUEUE_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                self.import.queue_capacity = n;
            }
        }
        if let Ok(deadline) = std::env::var("XV_DEADLINE_HOURS") {
            if let Ok(n) = deadline.parse() {
                self.import.deadline_hours = n;
            }
        }

        if let Ok(level) = std::env::var("XV_LOG") {
            self.logging.level = level;
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.store.is_some() {
            self.paths.store = other.paths.store;
        }
        if other.paths.profile_store.is_some() {
            self.paths.profile_store = other.paths.profile_store;
        }

        self.import.workers = other.import.workers;
        self.import.queue_capacity = other.import.queue_capacity;
        self.import.deadline_hours = other.import.deadline_hours;

        self.logging.level = other.logging.level;
        self.logging.format = other.logging.format;
    }

    /// Get the main store path, using defaults if not configured.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.paths
            .store
            .clone()
            .unwrap_or_else(crate::default_store_path)
    }

    /// Get the profile store path, using defaults if not configured.
    #[must_use]
    pub fn profile_store_path(&self) -> PathBuf {
        self.paths
            .profile_store
            .clone()
            .unwrap_or_else(crate::default_profile_store_path)
    }

    /// Pipeline options assembled from the import section.
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::default();
        if self.import.workers > 0 {
            options.workers = self.import.workers;
        }
        if self.import.queue_capacity > 0 {
            options.queue_capacity = self.import.queue_capacity;
        }
        options.deadline = Duration::from_secs(self.import.deadline_hours * 3600);
        options
    }

    /// Log configuration assembled from the logging section. Unrecognized
    /// values fall back to the defaults with a warning.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let mut log = LogConfig::default();
        match self.logging.level.parse() {
            Ok(level) => log.level = level,
            Err(e) => warn!("{e}, using default level"),
        }
        match self.logging.format.parse() {
            Ok(format) => log.format = format,
            Err(e) => warn!("{e}, using default format"),
        }
        log
    }
}
