//! Runtime tuning for alert handling and the change queue.
//!
//! # Responsibility
//! - Hold timing constants used by alert queries and event moves.
//! - Load overrides from a JSON file, falling back to defaults.
//!
//! # Invariants
//! - A config returned by `load_config` has passed `validate()`.

use crate::logging::default_log_level;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Default for `CalNotifyConfig::event_moved_threshold_ms`.
pub const DEFAULT_EVENT_MOVED_THRESHOLD_MS: i64 = HOUR_MS;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalNotifyConfig {
    /// Slack added to "now" when deciding whether an alert or event is due.
    pub alarm_threshold_ms: i64,
    /// Snooze delays offered by index, e.g. `snooze-preset` in the CLI.
    pub snooze_presets_ms: Vec<i64>,
    pub max_snooze_presets: usize,
    /// First notification id handed out on an empty store.
    pub notification_id_dynamic_from: i32,
    /// Minimum forward move of an event before its alerts are auto-dismissed.
    pub event_moved_threshold_ms: i64,
    /// Provider failures tolerated before a queued change is marked failed.
    pub max_change_retries: u32,
    pub log_level: String,
}

impl Default for CalNotifyConfig {
    fn default() -> Self {
        Self {
            alarm_threshold_ms: 15 * 1000,
            snooze_presets_ms: vec![15 * MINUTE_MS, HOUR_MS, 4 * HOUR_MS, DAY_MS],
            max_snooze_presets: 6,
            notification_id_dynamic_from: 1,
            event_moved_threshold_ms: DEFAULT_EVENT_MOVED_THRESHOLD_MS,
            max_change_retries: 5,
            log_level: default_log_level().to_string(),
        }
    }
}

impl CalNotifyConfig {
    /// Snooze delay for a preset index.
    pub fn snooze_preset_ms(&self, index: usize) -> Option<i64> {
        self.snooze_presets_ms.get(index).copied()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alarm_threshold_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "alarm_threshold_ms must not be negative, got {}",
                self.alarm_threshold_ms
            )));
        }
        if self.snooze_presets_ms.is_empty() {
            return Err(ConfigError::Invalid(
                "snooze_presets_ms must not be empty".to_string(),
            ));
        }
        if self.snooze_presets_ms.len() > self.max_snooze_presets {
            return Err(ConfigError::Invalid(format!(
                "at most {} snooze presets are supported, got {}",
                self.max_snooze_presets,
                self.snooze_presets_ms.len()
            )));
        }
        if let Some(bad) = self.snooze_presets_ms.iter().find(|value| **value <= 0) {
            return Err(ConfigError::Invalid(format!(
                "snooze presets must be positive, got {bad}"
            )));
        }
        if self.notification_id_dynamic_from < 1 {
            return Err(ConfigError::Invalid(format!(
                "notification_id_dynamic_from must be at least 1, got {}",
                self.notification_id_dynamic_from
            )));
        }
        if self.event_moved_threshold_ms <= 0 {
            return Err(ConfigError::Invalid(format!(
                "event_moved_threshold_ms must be positive, got {}",
                self.event_moved_threshold_ms
            )));
        }
        Ok(())
    }
}

/// Loads config from a JSON file.
///
/// A missing file yields defaults; unknown keys are ignored.
///
/// # Errors
/// - Unreadable file, malformed JSON, or values rejected by `validate()`.
pub fn load_config(path: impl AsRef<Path>) -> Result<CalNotifyConfig, ConfigError> {
    let path = path.as_ref();
    let config = match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str::<CalNotifyConfig>(&text)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!("event=config_load module=config status=default reason=missing_file");
            CalNotifyConfig::default()
        }
        Err(err) => return Err(err.into()),
    };
    config.validate()?;
    Ok(config)
}
