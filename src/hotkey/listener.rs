//! Global mute shortcut listener using macOS CGEventTap
//!
//! Watches system-wide key-down events for Command+Option+Shift+M and asks
//! the engine for a toggle. Runs on a dedicated thread with its own
//! CFRunLoop. Other platforms have no listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::engine::Command;

/// Global shortcut listener that requests manual mute toggles
pub struct HotkeyListener {
    engine_tx: mpsc::Sender<Command>,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(engine_tx: mpsc::Sender<Command>) -> Self {
        Self {
            engine_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the hotkey listener
    ///
    /// This spawns a dedicated thread that runs a CFRunLoop to receive
    /// CGEventTap callbacks. The listener runs until `stop()` is called
    /// or the program exits.
    ///
    /// Blocks until the event tap is installed, so `Ok` means the shortcut
    /// is live. A tap that cannot be created is reported here.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let engine_tx = self.engine_tx.clone();
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), HotkeyError>>();

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                let ready = ready_tx.clone();
                if let Err(e) = platform::run_event_loop(engine_tx, running.clone(), ready) {
                    error!(?e, "hotkey listener error");
                    // Nobody is listening once startup has been acknowledged
                    let _ = ready_tx.send(Err(e));
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        let started = ready_rx.recv().unwrap_or(Err(HotkeyError::ListenerExited));
        if started.is_err() {
            self.running.store(false, Ordering::SeqCst);
        }
        started
    }

    /// Stop the hotkey listener. The run loop exits on its next slice.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("global shortcuts are not supported on this platform")]
    Unsupported,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("listener thread exited before the event tap was ready")]
    ListenerExited,
}

#[cfg(target_os = "macos")]
mod platform {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tokio::sync::mpsc;
    use tracing::{debug, error, info, warn};

    use super::HotkeyError;
    use crate::engine::Command;
    use crate::events::ToggleSource;
    use crate::hotkey::keys::{KeyPress, ModifierState};

    /// Run the CFRunLoop with the event tap. `ready` is acknowledged once
    /// the tap is installed on the run loop.
    pub(super) fn run_event_loop(
        engine_tx: mpsc::Sender<Command>,
        running: Arc<AtomicBool>,
        ready: std::sync::mpsc::Sender<Result<(), HotkeyError>>,
    ) -> Result<(), HotkeyError> {
        let (callback_tx, callback_rx) = std::sync::mpsc::channel::<KeyPress>();

        // CGEventTap callback - must be fast and non-blocking
        let callback =
            move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| -> Option<CGEvent> {
                match event_type {
                    CGEventType::KeyDown => {
                        let press = KeyPress {
                            keycode: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE),
                            modifiers: ModifierState::from_flags(event.get_flags()),
                        };
                        if press.is_toggle() {
                            let _ = callback_tx.send(press);
                        }
                    }
                    CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                        warn!("event tap disabled, shortcut presses may be missed");
                    }
                    _ => {}
                }
                Some(event.clone())
            };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            callback,
        )
        .map_err(|_| {
            error!("failed to create event tap - is Accessibility permission granted?");
            HotkeyError::EventTapCreation
        })?;

        tap.enable();

        let run_loop_source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::EventTapCreation)?;
        let run_loop = CFRunLoop::get_current();

        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }

        info!("event tap created and enabled");
        let _ = ready.send(Ok(()));

        while running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
            }

            while let Ok(press) = callback_rx.try_recv() {
                debug!(?press, "mute shortcut pressed");

                let command = Command::Toggle {
                    source: ToggleSource::Hotkey,
                    reply: None,
                };
                if engine_tx.blocking_send(command).is_err() {
                    warn!("failed to send toggle - engine channel closed");
                    return Ok(());
                }
            }
        }

        // Tap is released when it goes out of scope
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::HotkeyError;
    use crate::engine::Command;

    pub(super) fn run_event_loop(
        _engine_tx: mpsc::Sender<Command>,
        _running: Arc<AtomicBool>,
        _ready: std::sync::mpsc::Sender<Result<(), HotkeyError>>,
    ) -> Result<(), HotkeyError> {
        Err(HotkeyError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(!listener.is_running());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_unsupported_platform() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());

        // A failed start can be retried and fails the same way
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());
    }
}
