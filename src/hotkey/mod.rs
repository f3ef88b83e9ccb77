//! Hotkey module for the global mute shortcut
//!
//! Uses macOS CGEventTap to watch for Command+Option+Shift+M and routes it
//! to the same toggle as the gesture.

mod keys;
mod listener;

pub use listener::HotkeyListener;
