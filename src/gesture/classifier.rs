//! Volume change classification
//!
//! Turns successive volume readings into directional events. Equal readings
//! and failed reads never produce an event.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::volume::NoReading;

/// Direction of a volume change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Increase => write!(f, "increase"),
            Direction::Decrease => write!(f, "decrease"),
        }
    }
}

/// A classified volume change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalEvent {
    pub kind: Direction,
    pub occurred_at: Instant,
}

/// Compare two readings. `None` when nothing changed.
pub fn classify(previous: u8, current: u8) -> Option<Direction> {
    use std::cmp::Ordering;

    match current.cmp(&previous) {
        Ordering::Greater => Some(Direction::Increase),
        Ordering::Less => Some(Direction::Decrease),
        Ordering::Equal => None,
    }
}

/// Tracks the last valid reading and classifies each new one against it
#[derive(Debug, Default)]
pub struct ChangeClassifier {
    previous: Option<u8>,
}

impl ChangeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one reading observed at `at`.
    ///
    /// The first valid reading only seeds the baseline. A `NoReading`
    /// leaves the baseline untouched so the next comparison still uses the
    /// last good value.
    pub fn observe(
        &mut self,
        reading: Result<u8, NoReading>,
        at: Instant,
    ) -> Option<DirectionalEvent> {
        let current = reading.ok()?;

        let previous = self.previous.replace(current)?;

        classify(previous, current).map(|kind| DirectionalEvent {
            kind,
            occurred_at: at,
        })
    }
}
