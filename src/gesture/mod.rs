//! Gesture module: volume change classification and up-then-down recognition

mod classifier;
mod recognizer;

pub use classifier::{ChangeClassifier, DirectionalEvent};
pub use recognizer::{GestureRecognizer, Outcome};
