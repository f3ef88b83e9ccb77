//! Output volume sources
//!
//! A source answers one question: what is the output volume right now.

use std::process::Command;

use tracing::debug;

/// The volume could not be read this time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoReading {
    #[error("failed to run volume command: {0}")]
    Command(String),

    #[error("volume command exited unsuccessfully: {0}")]
    Status(String),

    #[error("volume output is not a level")]
    Unparsable,
}

/// Anything that can report the current output volume level.
///
/// Reads may block; callers run them off the event-processing path.
pub trait VolumeSource: Send + Sync + 'static {
    fn read(&self) -> Result<u8, NoReading>;
}

/// Reads the output volume through AppleScript
#[derive(Debug, Clone)]
pub struct OsascriptVolume {
    program: String,
}

impl OsascriptVolume {
    const SCRIPT: &'static str = "output volume of (get volume settings)";

    pub fn new() -> Self {
        Self {
            program: "/usr/bin/osascript".to_string(),
        }
    }
}

impl Default for OsascriptVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeSource for OsascriptVolume {
    fn read(&self) -> Result<u8, NoReading> {
        let output = Command::new(&self.program)
            .args(["-e", Self::SCRIPT])
            .output()
            .map_err(|e| NoReading::Command(e.to_string()))?;

        if !output.status.success() {
            return Err(NoReading::Status(output.status.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let level = parse_level(&stdout)?;
        debug!(level, "volume read");
        Ok(level)
    }
}

/// Parse a volume level as printed by `osascript`.
///
/// Output such as `missing value` (no controllable output device) is not a
/// reading.
pub fn parse_level(raw: &str) -> Result<u8, NoReading> {
    raw.trim().parse::<u8>().map_err(|_| NoReading::Unparsable)
}
