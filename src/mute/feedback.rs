//! Audible and visual feedback
//!
//! Everything here is best-effort. Failures are logged and swallowed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{Icon, MuteEvent};

/// Feedback shown to the user after a toggle
pub trait Feedback: Send + 'static {
    fn play_mute_sound(&mut self);
    fn play_unmute_sound(&mut self);
    fn update_icon(&mut self, muted: bool);
}

/// Plays system sounds with `afplay` and publishes icon changes for the
/// menu bar client
pub struct SystemFeedback {
    mute_sound: PathBuf,
    unmute_sound: PathBuf,
    volume: f32,
    event_tx: broadcast::Sender<MuteEvent>,
}

impl SystemFeedback {
    pub fn new(
        mute_sound: PathBuf,
        unmute_sound: PathBuf,
        volume: f32,
        event_tx: broadcast::Sender<MuteEvent>,
    ) -> Self {
        Self {
            mute_sound,
            unmute_sound,
            volume,
            event_tx,
        }
    }

    fn play(&self, sound: &Path) {
        // Not waited on; tokio reaps the dropped child in the background
        let spawned = Command::new("afplay")
            .arg("-v")
            .arg(self.volume.to_string())
            .arg(sound)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(_) => debug!(?sound, "playing feedback sound"),
            Err(e) => warn!(?e, ?sound, "failed to play feedback sound"),
        }
    }
}

impl Feedback for SystemFeedback {
    fn play_mute_sound(&mut self) {
        self.play(&self.mute_sound);
    }

    fn play_unmute_sound(&mut self) {
        self.play(&self.unmute_sound);
    }

    fn update_icon(&mut self, muted: bool) {
        let icon = Icon::for_muted(muted);
        // No receivers just means no menu bar client is attached
        let _ = self.event_tx.send(MuteEvent::IconChanged { icon });
    }
}
