//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Invalid configuration value
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Maximum time between volume up and volume down
    pub window: Duration,

    /// How often the output volume is sampled
    pub poll_interval: Duration,

    /// Input volume restored on unmute (0-100)
    pub unmuted_input_level: u8,

    /// Playback volume for feedback sounds (0.0-1.0)
    pub sound_volume: f32,

    pub mute_sound: PathBuf,
    pub unmute_sound: PathBuf,
}

impl Config {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1500);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_INPUT_LEVEL: u8 = 20;
    pub const DEFAULT_SOUND_VOLUME: f32 = 0.5;

    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Self::from_lookup(&home, |var| std::env::var(var).ok())
    }

    /// Build a configuration from a home directory and a variable lookup
    pub fn from_lookup<F>(home: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("airmute");

        let socket_path = lookup("AIRMUTE_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let window = match lookup("AIRMUTE_WINDOW_MS") {
            Some(value) => parse_millis("AIRMUTE_WINDOW_MS", value)?,
            None => Self::DEFAULT_WINDOW,
        };

        let poll_interval = match lookup("AIRMUTE_POLL_MS") {
            Some(value) => parse_millis("AIRMUTE_POLL_MS", value)?,
            None => Self::DEFAULT_POLL_INTERVAL,
        };

        let unmuted_input_level = match lookup("AIRMUTE_INPUT_LEVEL") {
            Some(value) => value
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|level| *level <= 100)
                .ok_or(ConfigError::Invalid {
                    var: "AIRMUTE_INPUT_LEVEL",
                    expected: "an integer between 0 and 100",
                    value,
                })?,
            None => Self::DEFAULT_INPUT_LEVEL,
        };

        let sound_volume = match lookup("AIRMUTE_SOUND_VOLUME") {
            Some(value) => value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .ok_or(ConfigError::Invalid {
                    var: "AIRMUTE_SOUND_VOLUME",
                    expected: "a number between 0.0 and 1.0",
                    value,
                })?,
            None => Self::DEFAULT_SOUND_VOLUME,
        };

        Ok(Self {
            socket_path,
            data_dir,
            window,
            poll_interval,
            unmuted_input_level,
            sound_volume,
            mute_sound: PathBuf::from("/System/Library/Sounds/Funk.aiff"),
            unmute_sound: PathBuf::from("/System/Library/Sounds/Glass.aiff"),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse_millis(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a positive number of milliseconds",
            value,
        }),
    }
}
