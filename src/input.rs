//! Toolkit-independent input events consumed by the paint tool controller.
//!
//! Positions are viewport coordinates (pixels from the top-left corner of the
//! canvas widget). The GUI shell translates its raw input into these.

use eframe::egui;
use egui::Pos2;

/// Modifier keys held while an event fired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    /// Ctrl on Windows/Linux, Cmd on macOS.
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, alt: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true, ctrl: false, alt: false };
    pub const CTRL: Modifiers = Modifiers { shift: false, ctrl: true, alt: false };
}

impl From<egui::Modifiers> for Modifiers {
    fn from(m: egui::Modifiers) -> Self {
        Self {
            shift: m.shift,
            ctrl: m.command,
            alt: m.alt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Keys the annotator reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Flood fill at the cursor.
    F,
    /// Undo when combined with Ctrl.
    Z,
    /// Previous image.
    P,
    /// Next image.
    N,
    /// Clear all (not implemented).
    R,
    /// Toggle paint mode.
    M,
}

impl Key {
    pub fn all() -> &'static [Key] {
        &[Key::F, Key::Z, Key::P, Key::N, Key::R, Key::M]
    }

    pub fn to_egui(self) -> egui::Key {
        match self {
            Key::F => egui::Key::F,
            Key::Z => egui::Key::Z,
            Key::P => egui::Key::P,
            Key::N => egui::Key::N,
            Key::R => egui::Key::R,
            Key::M => egui::Key::M,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown {
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
        double_click: bool,
    },
    PointerDrag {
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerUp {
        pos: Pos2,
        button: PointerButton,
        modifiers: Modifiers,
    },
    /// `hover` is where the pointer rests, if it is over the canvas.
    KeyPress {
        key: Key,
        modifiers: Modifiers,
        hover: Option<Pos2>,
    },
    /// `notches > 0` scrolls up (away from the user).
    ScrollWheel {
        pos: Pos2,
        notches: f32,
        modifiers: Modifiers,
    },
}
