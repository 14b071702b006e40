//! Pointer and keyboard events consumed by the interaction engine.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer press, drag or release in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub modifiers: Modifiers,
    pub time: Instant,
}

impl PointerEvent {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            modifiers: Modifiers::NONE,
            time: Instant::now(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn at(mut self, time: Instant) -> Self {
        self.time = time;
        self
    }
}

/// Keys the engine reacts to. Printable input arrives as `Char`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Enter,
    Char(char),
}

/// A key press with the modifiers held at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Editor commands a key press can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
    DeleteSelection,
    Cancel,
    BringToFront,
    SendToBack,
}

impl KeyEvent {
    /// Map a key press to an editor command, if it is bound to one.
    pub fn shortcut(&self) -> Option<Shortcut> {
        let m = self.modifiers;
        match self.key {
            Key::Char(c) if m.command() => match c.to_ascii_lowercase() {
                'z' if m.shift => Some(Shortcut::Redo),
                'z' => Some(Shortcut::Undo),
                'y' => Some(Shortcut::Redo),
                ']' => Some(Shortcut::BringToFront),
                '[' => Some(Shortcut::SendToBack),
                _ => None,
            },
            Key::Delete | Key::Backspace => Some(Shortcut::DeleteSelection),
            Key::Escape => Some(Shortcut::Cancel),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(c: char, modifiers: Modifiers) -> Option<Shortcut> {
        KeyEvent::new(Key::Char(c)).with_modifiers(modifiers).shortcut()
    }

    #[test]
    fn test_undo_redo_bindings() {
        assert_eq!(press('z', Modifiers::ctrl()), Some(Shortcut::Undo));
        let ctrl_shift = Modifiers { shift: true, ..Modifiers::ctrl() };
        assert_eq!(press('Z', ctrl_shift), Some(Shortcut::Redo));
        assert_eq!(press('y', Modifiers { meta: true, ..Modifiers::NONE }), Some(Shortcut::Redo));
        assert_eq!(press('z', Modifiers::NONE), None);
    }

    #[test]
    fn test_z_order_and_delete_bindings() {
        assert_eq!(press(']', Modifiers::ctrl()), Some(Shortcut::BringToFront));
        assert_eq!(press('[', Modifiers::ctrl()), Some(Shortcut::SendToBack));
        assert_eq!(KeyEvent::new(Key::Backspace).shortcut(), Some(Shortcut::DeleteSelection));
        assert_eq!(KeyEvent::new(Key::Escape).shortcut(), Some(Shortcut::Cancel));
        assert_eq!(KeyEvent::new(Key::Enter).shortcut(), None);
    }
}
