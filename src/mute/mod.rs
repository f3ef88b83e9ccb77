//! Mute module: the mute flag, the microphone actuator and user feedback

mod actuator;
mod controller;
mod feedback;

pub use actuator::{Actuator, OsascriptInputGain};
pub use controller::MuteController;
pub use feedback::{Feedback, SystemFeedback};

#[cfg(test)]
pub(crate) use controller::doubles;
