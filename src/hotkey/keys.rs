//! Shortcut key definitions
//!
//! The manual toggle is Command+Option+Shift+M. Modifier flags come from
//! CGEventFlags on macOS; the matching logic itself is platform-free.

/// Virtual keycode of the M key (kVK_ANSI_M)
pub const KEYCODE_M: i64 = 46;

/// Modifier flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
}

/// Which modifier keys are held during a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub control: bool,
    pub option: bool,
    pub command: bool,
    pub shift: bool,
}

impl ModifierState {
    /// Create a new ModifierState from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(event_flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            control: event_flags.contains(flags::CONTROL),
            option: event_flags.contains(flags::OPTION),
            command: event_flags.contains(flags::COMMAND),
            shift: event_flags.contains(flags::SHIFT),
        }
    }

    /// Command, Option and Shift are all held. Control is not inspected.
    pub fn is_toggle_chord(&self) -> bool {
        self.command && self.option && self.shift
    }
}

/// A key-down with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub keycode: i64,
    pub modifiers: ModifierState,
}

impl KeyPress {
    /// Whether this press is the mute shortcut
    pub fn is_toggle(&self) -> bool {
        self.keycode == KEYCODE_M && self.modifiers.is_toggle_chord()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord() -> ModifierState {
        ModifierState {
            control: false,
            option: true,
            command: true,
            shift: true,
        }
    }

    #[test]
    fn test_empty_state() {
        let state = ModifierState::default();
        assert!(!state.is_toggle_chord());
    }

    #[test]
    fn test_toggle_chord() {
        assert!(chord().is_toggle_chord());

        let with_control = ModifierState {
            control: true,
            ..chord()
        };
        assert!(with_control.is_toggle_chord());

        let without_shift = ModifierState {
            shift: false,
            ..chord()
        };
        assert!(!without_shift.is_toggle_chord());
    }

    #[test]
    fn test_toggle_press() {
        let press = KeyPress {
            keycode: KEYCODE_M,
            modifiers: chord(),
        };
        assert!(press.is_toggle());

        let other_key = KeyPress {
            keycode: 45,
            modifiers: chord(),
        };
        assert!(!other_key.is_toggle());

        let bare_m = KeyPress {
            keycode: KEYCODE_M,
            modifiers: ModifierState::default(),
        };
        assert!(!bare_m.is_toggle());
    }
}
