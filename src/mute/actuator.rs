//! Microphone gain actuation

use std::process::Command;

use tracing::debug;

/// The microphone state could not be applied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuationError {
    #[error("failed to run actuator command: {0}")]
    Command(String),

    #[error("actuator command exited unsuccessfully: {0}")]
    Status(String),
}

/// Applies a mute state to the microphone.
///
/// Calls may block; the controller runs them on the blocking pool.
pub trait Actuator: Send + Sync + 'static {
    fn set_microphone_muted(&self, muted: bool) -> Result<(), ActuationError>;
}

/// Mutes by dropping the input volume to zero and unmutes by restoring a
/// fixed level
#[derive(Debug, Clone)]
pub struct OsascriptInputGain {
    program: String,
    unmuted_level: u8,
}

impl OsascriptInputGain {
    pub fn new(unmuted_level: u8) -> Self {
        Self {
            program: "/usr/bin/osascript".to_string(),
            unmuted_level,
        }
    }

    fn script(&self, muted: bool) -> String {
        let level = if muted { 0 } else { self.unmuted_level };
        format!("set volume input volume {}", level)
    }
}

impl Actuator for OsascriptInputGain {
    fn set_microphone_muted(&self, muted: bool) -> Result<(), ActuationError> {
        let script = self.script(muted);
        debug!(%script, "applying input volume");

        let status = Command::new(&self.program)
            .args(["-e", &script])
            .status()
            .map_err(|e| ActuationError::Command(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(ActuationError::Status(status.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_levels() {
        let gain = OsascriptInputGain::new(20);
        assert_eq!(gain.script(true), "set volume input volume 0");
        assert_eq!(gain.script(false), "set volume input volume 20");
    }

    #[test]
    fn test_missing_program_is_error() {
        let gain = OsascriptInputGain {
            program: "/nonexistent/airmute-osascript".to_string(),
            unmuted_level: 20,
        };
        assert!(matches!(
            gain.set_microphone_muted(true),
            Err(ActuationError::Command(_))
        ));
    }
}
