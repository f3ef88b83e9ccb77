//! Events module for mute and gesture notifications
//!
//! Emitted by the engine on a broadcast channel and pushed to subscribed
//! IPC clients (the menu bar app renders the icon from these).

use serde::{Deserialize, Serialize};

/// What asked for a mute toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleSource {
    /// Volume up then volume down
    Gesture,
    /// Global keyboard shortcut
    Hotkey,
    /// Menu action over IPC
    Menu,
}

impl std::fmt::Display for ToggleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToggleSource::Gesture => write!(f, "gesture"),
            ToggleSource::Hotkey => write!(f, "hotkey"),
            ToggleSource::Menu => write!(f, "menu"),
        }
    }
}

/// Status icon shown by the menu bar client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Icon {
    #[serde(rename = "mic")]
    Mic,
    #[serde(rename = "mic.slash")]
    MicSlash,
}

impl Icon {
    pub fn for_muted(muted: bool) -> Self {
        if muted {
            Icon::MicSlash
        } else {
            Icon::Mic
        }
    }
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MuteEvent {
    /// Volume up then down recognized
    GestureDetected,

    /// Microphone mute state changed
    MuteChanged {
        muted: bool,
        source: ToggleSource,
    },

    /// The actuator refused the requested state
    ActuationFailed {
        requested: bool,
        reason: String,
    },

    /// Icon should be redrawn
    IconChanged { icon: Icon },
}

impl std::fmt::Display for MuteEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MuteEvent::GestureDetected => write!(f, "GESTURE_DETECTED"),
            MuteEvent::MuteChanged { muted, source } => {
                write!(f, "MUTE_CHANGED (muted={}, via {})", muted, source)
            }
            MuteEvent::ActuationFailed { requested, reason } => {
                write!(f, "ACTUATION_FAILED (requested={}: {})", requested, reason)
            }
            MuteEvent::IconChanged { icon } => write!(f, "ICON_CHANGED ({:?})", icon),
        }
    }
}
