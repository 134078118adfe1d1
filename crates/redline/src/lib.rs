//! redline: a readline-style interactive line editor.
//!
//! The [`Editor`] owns the buffer, input decoder, render engine, history and
//! keymap, and is driven either by an external event loop (call
//! [`Editor::handle_input`] when stdin is readable and
//! [`Editor::notify_resize`] on SIGWINCH) or by the blocking convenience
//! loop [`Editor::get_line`].
//!
//! Everything runs on the caller's thread: callbacks are invoked
//! synchronously, re-entrant input is buffered and replayed, and deferred
//! work (resize recalculation waiting on a cursor-position report) drains at
//! safe points between complete logical events.

mod completion;
mod editor;

pub use completion::CompletionSuggestion;
pub use editor::{Editor, EditorCtx, SessionResult};

pub use core_events::{InputEvent, KeyCode, KeyEvent, KeyModifiers};
pub use core_history::{HistControl, History, HistoryEntry};
pub use core_keymap::{BindingAction, InternalFunction, KeyBinding, Keymap};
pub use core_text::{Color, LineBuffer, Mask, Span, Style};

use thiserror::Error;

/// Fatal outcomes of an edit session. Local conditions (malformed escapes,
/// invalid UTF-8, `EINTR`) are recovered internally and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// Terminal descriptor I/O failed (anything other than `EINTR`).
    #[error("terminal read failure: {0}")]
    ReadFailure(#[from] std::io::Error),
    /// A read returned zero bytes: the descriptor is gone (pipe closed).
    #[error("no input available")]
    Empty,
    /// Explicit end-of-file (Ctrl-D on an empty line, or end of piped
    /// input on the non-interactive fallback path).
    #[error("end of file")]
    Eof,
    /// The interrupt path ran (Ctrl-C or an observed interrupt signal).
    #[error("interrupted")]
    Interrupted,
}

/// Read-only snapshot of the edit state handed to callbacks. Callbacks must
/// not re-enter the editor's mutation API; everything they need is here.
#[derive(Debug, Clone)]
pub struct LineContext {
    pub text: String,
    pub cursor: usize,
    /// Start offset of the word under completion (code points).
    pub word_start: usize,
    /// The token being completed.
    pub word: String,
}
