//! Up-then-down gesture recognition
//!
//! A two-state machine over directional events:
//! - Idle: nothing buffered, no deadline
//! - Armed: one event buffered, deadline running from the first event
//!
//! The second event inside the window is evaluated immediately and always
//! returns the machine to Idle. The deadline is fixed at the first event and
//! never slides, so a stale half-gesture cannot combine with a later event.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::classifier::{Direction, DirectionalEvent};

/// The only sequence that counts as a gesture
pub const GESTURE: [Direction; 2] = [Direction::Increase, Direction::Decrease];

/// Observable recognizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognizerState {
    #[default]
    Idle,
    Armed,
}

impl std::fmt::Display for RecognizerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognizerState::Idle => write!(f, "Idle"),
            RecognizerState::Armed => write!(f, "Armed"),
        }
    }
}

/// Result of feeding one event to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First event buffered, deadline armed
    Started,
    /// Previous sequence had outlived the window; this event starts a new one
    Restarted,
    /// `[Increase, Decrease]` completed inside the window
    Detected,
    /// Two events that are not the gesture; sequence discarded
    Mismatch { first: Direction, second: Direction },
    /// Deadline could not be armed; treated as immediate expiry
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct Sequence {
    first: Direction,
    started_at: Instant,
    deadline: Instant,
}

/// Gesture recognizer with a single fixed deadline per sequence
#[derive(Debug)]
pub struct GestureRecognizer {
    window: Duration,
    sequence: Option<Sequence>,
}

impl GestureRecognizer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            sequence: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> RecognizerState {
        match self.sequence {
            Some(_) => RecognizerState::Armed,
            None => RecognizerState::Idle,
        }
    }

    /// When the armed sequence expires, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.sequence.map(|s| s.deadline)
    }

    /// Feed one directional event
    pub fn on_event(&mut self, event: DirectionalEvent) -> Outcome {
        let Some(sequence) = self.sequence.take() else {
            return self.start(event, Outcome::Started);
        };

        let elapsed = event.occurred_at.saturating_duration_since(sequence.started_at);
        if elapsed > self.window {
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                "sequence outlived window, starting fresh"
            );
            return self.start(event, Outcome::Restarted);
        }

        let buffer = [sequence.first, event.kind];
        if buffer == GESTURE {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "gesture matched");
            Outcome::Detected
        } else {
            debug!(first = %buffer[0], second = %buffer[1], "sequence mismatch, reset");
            Outcome::Mismatch {
                first: buffer[0],
                second: buffer[1],
            }
        }
    }

    /// Deadline check. Returns `true` if an armed sequence expired.
    ///
    /// A wakeup for a deadline that was already cancelled or re-armed to a
    /// later instant is ignored.
    pub fn on_deadline(&mut self, now: Instant) -> bool {
        match self.sequence {
            Some(sequence) if now >= sequence.deadline => {
                debug!(first = %sequence.first, "sequence expired without a second event");
                self.sequence = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any in-progress sequence and its deadline
    pub fn reset(&mut self) {
        self.sequence = None;
    }

    fn start(&mut self, event: DirectionalEvent, outcome: Outcome) -> Outcome {
        match event.occurred_at.checked_add(self.window) {
            Some(deadline) => {
                debug!(kind = %event.kind, "sequence armed");
                self.sequence = Some(Sequence {
                    first: event.kind,
                    started_at: event.occurred_at,
                    deadline,
                });
                outcome
            }
            None => {
                warn!("failed to arm gesture deadline, treating as expired");
                self.sequence = None;
                Outcome::Expired
            }
        }
    }
}
