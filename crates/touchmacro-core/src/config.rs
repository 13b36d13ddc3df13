//! Engine configuration, loadable from TOML
//!
//! Every key is optional; anything left out keeps its default.
//!
//! ```toml
//! storage_dir = "/data/macros"
//!
//! [recorder]
//! max_events = 50000
//!
//! [playback]
//! min_speed = 0.25
//! max_speed = 10.0
//! min_gesture_ms = 16
//! pause_poll_ms = 50
//!
//! [scheduler]
//! prefer_exact = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where macros are stored. Defaults to the platform data dir.
    pub storage_dir: Option<PathBuf>,
    pub recorder: RecorderConfig,
    pub playback: PlaybackConfig,
    pub scheduler: SchedulerConfig,
}

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Events past this count are dropped for the rest of the session
    pub max_events: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub min_speed: f32,
    pub max_speed: f32,
    /// Shortest gesture the capability can reliably express
    pub min_gesture_ms: u64,
    /// How often a paused run re-checks the pause flag
    pub pause_poll_ms: u64,
    /// Buffered state transitions per subscriber
    pub state_channel_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.25,
            max_speed: 10.0,
            min_gesture_ms: 16,
            pause_poll_ms: 50,
            state_channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ask for exact delivery when the host allows it.
    pub prefer_exact: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { prefer_exact: true }
    }
}

impl Config {
    /// `~/.config/touchmacro/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("touchmacro").join("config.toml"))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.playback;
        if !(p.min_speed > 0.0 && p.min_speed <= p.max_speed) {
            return Err(ConfigError::Invalid(format!(
                "speed range [{}, {}] is empty or non-positive",
                p.min_speed, p.max_speed
            )));
        }
        if p.pause_poll_ms == 0 {
            return Err(ConfigError::Invalid("pause_poll_ms must be positive".into()));
        }
        if p.state_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "state_channel_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Configured storage dir, else `<data dir>/touchmacro`.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("touchmacro")))
    }
}
