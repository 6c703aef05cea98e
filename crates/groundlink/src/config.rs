//! Configuration management for groundlink.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::drone::Thresholds;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "groundlink";

/// Default journal database file name.
const JOURNAL_FILE_NAME: &str = "journal.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GROUNDLINK_`, sections separated
///    by a double underscore: `GROUNDLINK_TELEMETRY__STALENESS_TIMEOUT_MS`)
/// 2. TOML config file at `~/.config/groundlink/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fleet registry configuration.
    pub fleet: FleetConfig,
    /// Telemetry ingestion configuration.
    pub telemetry: TelemetryConfig,
    /// Event journal configuration.
    pub journal: JournalConfig,
}

/// Fleet-registry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Maximum number of registered drones.
    pub max_drones: usize,
    /// Regex every drone id must match at registration, anchored over the
    /// whole id.
    pub id_pattern: String,
    /// Capacity of the state-change broadcast channel. Slow subscribers
    /// that fall further behind than this lose the oldest events.
    pub events_buffer: usize,
}

/// Telemetry ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// How long a drone may go without a valid sample before an airborne
    /// vehicle is declared in emergency, in milliseconds.
    pub staleness_timeout_ms: u64,
    /// Relative altitude at which a takeoff counts as complete, meters.
    pub takeoff_altitude_m: f64,
    /// Relative altitude at or below which a landing vehicle has touched
    /// down, meters.
    pub ground_altitude_m: f64,
    /// Descent rate above which a landing is abnormal, m/s.
    pub max_descent_mps: f64,
    /// Battery percentage at or below which an airborne vehicle is in
    /// emergency.
    pub battery_critical_pct: f64,
}

/// Event-journal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Path to the journal database file.
    /// Defaults to `~/.local/share/groundlink/journal.db`
    pub database_path: Option<PathBuf>,
    /// Maximum number of events to retain.
    /// Set to 0 for unlimited.
    pub max_events: usize,
    /// Maximum age of events to retain in days.
    /// Set to 0 for unlimited.
    pub max_age_days: u32,
    /// Prune interval in hours.
    pub prune_interval_hours: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_drones: 64,
            id_pattern: r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$".to_string(),
            events_buffer: 256,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            staleness_timeout_ms: 3_000,
            takeoff_altitude_m: 2.5,
            ground_altitude_m: 0.5,
            max_descent_mps: 4.0,
            battery_critical_pct: 10.0,
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            max_events: 100_000,
            max_age_days: 30,
            prune_interval_hours: 24,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `GROUNDLINK_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("GROUNDLINK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.fleet.max_drones == 0 {
            return Err(Error::ConfigValidation {
                message: "max_drones must be greater than 0".to_string(),
            });
        }

        if self.fleet.events_buffer == 0 {
            return Err(Error::ConfigValidation {
                message: "events_buffer must be greater than 0".to_string(),
            });
        }

        if regex::Regex::new(&self.fleet.id_pattern).is_err() {
            return Err(Error::ConfigValidation {
                message: format!("invalid id_pattern regex: {}", self.fleet.id_pattern),
            });
        }

        if self.telemetry.staleness_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "staleness_timeout_ms must be greater than 0".to_string(),
            });
        }

        if !self.telemetry.takeoff_altitude_m.is_finite() || self.telemetry.takeoff_altitude_m <= 0.0
        {
            return Err(Error::ConfigValidation {
                message: "takeoff_altitude_m must be a positive number".to_string(),
            });
        }

        if !self.telemetry.ground_altitude_m.is_finite() || self.telemetry.ground_altitude_m < 0.0 {
            return Err(Error::ConfigValidation {
                message: "ground_altitude_m must be zero or positive".to_string(),
            });
        }

        if self.telemetry.ground_altitude_m >= self.telemetry.takeoff_altitude_m {
            return Err(Error::ConfigValidation {
                message: format!(
                    "ground_altitude_m ({}) must be below takeoff_altitude_m ({})",
                    self.telemetry.ground_altitude_m, self.telemetry.takeoff_altitude_m
                ),
            });
        }

        if !self.telemetry.max_descent_mps.is_finite() || self.telemetry.max_descent_mps <= 0.0 {
            return Err(Error::ConfigValidation {
                message: "max_descent_mps must be a positive number".to_string(),
            });
        }

        if !(0.0..=100.0).contains(&self.telemetry.battery_critical_pct) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "battery_critical_pct ({}) must be in [0, 100]",
                    self.telemetry.battery_critical_pct
                ),
            });
        }

        Ok(())
    }

    /// Get the journal database path, resolving defaults if not set.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.journal
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(JOURNAL_FILE_NAME))
    }

    /// Get the staleness timeout as a Duration.
    #[must_use]
    pub fn staleness_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry.staleness_timeout_ms)
    }

    /// The ingestion thresholds this configuration describes.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            takeoff_altitude_m: self.telemetry.takeoff_altitude_m,
            ground_altitude_m: self.telemetry.ground_altitude_m,
            max_descent_mps: self.telemetry.max_descent_mps,
            battery_critical_pct: self.telemetry.battery_critical_pct,
        }
    }

    /// Compile the registration id pattern.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the pattern does not compile;
    /// [`Config::validate`] catches this earlier in normal loading.
    pub fn compiled_id_pattern(&self) -> Result<regex::Regex> {
        regex::Regex::new(&self.fleet.id_pattern).map_err(|err| Error::ConfigValidation {
            message: format!("invalid id_pattern regex: {err}"),
        })
    }

    /// Get the journal max age, or [`None`] when age-based pruning is off.
    #[must_use]
    pub fn journal_max_age(&self) -> Option<chrono::Duration> {
        if self.journal.max_age_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(self.journal.max_age_days)))
        }
    }

    /// Get the journal prune interval as a Duration.
    #[must_use]
    pub fn journal_prune_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.journal.prune_interval_hours) * 60 * 60)
    }
}
