//! Engine module: the event loop that owns gesture and mute state
//!
//! Inputs (volume readings, manual toggles) are serialized through one
//! channel; the engine emits `MuteEvent`s on a broadcast channel.

mod machine;

pub use machine::{Command, Engine};
