//! Core event types shared between the input decoder, keymap, and editor.
//!
//! Everything here is a plain value type: the decoder produces
//! [`InputEvent`]s, the keymap consumes [`KeyEvent`]s, and the editor routes
//! between them. No I/O happens in this crate.

use std::fmt;
use std::sync::atomic::AtomicU64;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspectable from unit tests or periodically logged.
// Counters record sizes and counts only; raw input content is never captured
// here (or anywhere in the logging surface).
// -------------------------------------------------------------------------------------------------
pub static DECODE_BYTES_DISCARDED: AtomicU64 = AtomicU64::new(0); // invalid UTF-8 prefix bytes dropped
pub static DECODE_UNKNOWN_CSI: AtomicU64 = AtomicU64::new(0); // CSI sequences with unhandled finals
pub static KEYS_DECODED: AtomicU64 = AtomicU64::new(0); // logical key events emitted
pub static PASTE_SESSIONS: AtomicU64 = AtomicU64::new(0); // bracketed paste start markers seen
pub static PASTE_BYTES: AtomicU64 = AtomicU64::new(0); // total bytes delivered via paste events

bitflags::bitflags! {
    /// Modifier bits as encoded by xterm-style CSI parameters: the wire value
    /// is `(mods - 1)` with Shift=1, Alt=2, Ctrl=4.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
    }
}

impl KeyModifiers {
    /// Decode the second CSI parameter of a modified key sequence
    /// (e.g. `ESC [ 1 ; 5 C` is Ctrl-Right: parameter 5 → bits 4 → CTRL).
    /// Parameter values 0 and 1 both mean "no modifiers".
    pub fn from_csi_param(param: u32) -> Self {
        match param {
            0 | 1 => Self::empty(),
            n => Self::from_bits_truncate(((n - 1) & 0x7) as u8),
        }
    }
}

/// Normalized logical key identity produced by the decoder.
///
/// Control bytes stay as `Char` values (`Ctrl-D` arrives as `Char('\x04')`),
/// matching what a raw terminal delivers; the keymap layer is responsible for
/// folding `Ctrl+<letter>` chords onto the same representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
    /// Reverse tab, CSI final `Z`.
    BackTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    /// A bare character key with no modifiers.
    pub fn plain(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), KeyModifiers::empty())
    }

    /// A named key with no modifiers.
    pub fn plain_code(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::empty())
    }

    /// An Alt-modified character key (`ESC x` on the wire).
    pub fn alt(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), KeyModifiers::ALT)
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.contains(KeyModifiers::CTRL) {
            write!(f, "C-")?;
        }
        if self.mods.contains(KeyModifiers::ALT) {
            write!(f, "M-")?;
        }
        if self.mods.contains(KeyModifiers::SHIFT) {
            write!(f, "S-")?;
        }
        match self.code {
            KeyCode::Char(c) if c.is_control() => write!(f, "^{}", control_caret(c)),
            KeyCode::Char(c) => write!(f, "{c}"),
            other => write!(f, "{other:?}"),
        }
    }
}

fn control_caret(c: char) -> char {
    // ^@ .. ^_ for C0, ^? for DEL; anything else renders as-is.
    match c as u32 {
        n @ 0..=0x1f => char::from_u32(n + 0x40).unwrap_or('?'),
        0x7f => '?',
        _ => c,
    }
}

/// Logical events the decoder hands to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A key press with its modifier set.
    Key(KeyEvent),
    /// A code point captured while the verbatim-insert state was armed;
    /// inserted literally, bypassing all binding interpretation.
    Verbatim(char),
    /// The complete content of one bracketed paste, delivered atomically so
    /// pasted text can never trigger key bindings.
    Paste(String),
    /// A cursor position report (`ESC [ row ; col R`), the response to a DSR
    /// query issued by the render engine.
    CursorReport { row: u16, col: u16 },
}

/// Result alias used at event-handling seams.
pub type EventResult<T> = anyhow::Result<T>;
