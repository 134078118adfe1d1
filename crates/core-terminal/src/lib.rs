//! Terminal backend abstraction and crossterm implementation.
//!
//! The termios mode is the one process-wide mutable resource this system
//! touches, so session entry/exit is guarded: `enter` is idempotent, `leave`
//! runs on every exit path via `Drop`, and an edit session holds a
//! [`TerminalGuard`] so early returns and panics still restore the terminal.

use anyhow::Result;
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{Write, stdout};

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
}

/// Raw mode plus bracketed paste, entered for the duration of one edit
/// session. No alternate screen: a line editor shares the scrollback.
pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if the caller
/// early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnableBracketedPaste)?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), DisableBracketedPaste)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a> Drop for TerminalGuard<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}

/// Current terminal size in (columns, rows), with a conservative fallback
/// when the query fails (e.g. output is not a tty).
pub fn terminal_size() -> (u16, u16) {
    crossterm::terminal::size().unwrap_or((80, 24))
}

/// Queue a DSR cursor-position query (`ESC [ 6 n`). The response arrives on
/// the input stream as `ESC [ row ; col R` and is decoded like any other CSI
/// sequence.
pub fn queue_cursor_position_query<W: Write>(w: &mut W) -> std::io::Result<()> {
    w.write_all(b"\x1b[6n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsr_query_bytes() {
        let mut out = Vec::new();
        queue_cursor_position_query(&mut out).expect("write to vec");
        assert_eq!(out, b"\x1b[6n");
    }
}
