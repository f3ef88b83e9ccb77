//! Mute state and the single toggle entry point

use std::sync::Arc;

use tracing::{info, warn};

use super::actuator::{ActuationError, Actuator};
use super::feedback::Feedback;

/// Owns the mute flag and drives the actuator and feedback
pub struct MuteController<A, F> {
    muted: bool,
    actuator: Arc<A>,
    feedback: F,
}

impl<A: Actuator, F: Feedback> MuteController<A, F> {
    pub fn new(actuator: A, feedback: F) -> Self {
        Self {
            muted: false,
            actuator: Arc::new(actuator),
            feedback,
        }
    }

    /// Current (actually applied) mute state
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Invert the mute state.
    ///
    /// The actuator runs on the blocking pool, so the caller's task yields
    /// while it works. `&mut self` keeps toggles one at a time.
    ///
    /// Returns the new state. On failure the flag is unchanged and the icon
    /// is redrawn from the state that is actually in effect.
    pub async fn toggle(&mut self) -> Result<bool, ActuationError> {
        let requested = !self.muted;

        if let Err(e) = self.apply(requested).await {
            warn!(%e, requested, "failed to apply microphone mute");
            self.feedback.update_icon(self.muted);
            return Err(e);
        }

        self.muted = requested;
        if requested {
            self.feedback.play_mute_sound();
        } else {
            self.feedback.play_unmute_sound();
        }
        self.feedback.update_icon(requested);

        info!(muted = requested, "microphone mute toggled");
        Ok(requested)
    }

    /// Redraw the icon without changing state
    pub fn refresh(&mut self) {
        self.feedback.update_icon(self.muted);
    }

    async fn apply(&self, muted: bool) -> Result<(), ActuationError> {
        let actuator = Arc::clone(&self.actuator);
        match tokio::task::spawn_blocking(move || actuator.set_microphone_muted(muted)).await {
            Ok(result) => result,
            Err(e) => Err(ActuationError::Command(e.to_string())),
        }
    }
}
