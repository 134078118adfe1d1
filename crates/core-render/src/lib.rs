//! Incremental redraw engine.
//!
//! Each refresh picks one of three paths:
//! 1. Pure cursor move: nothing changed since the last draw except the
//!    logical cursor; only reposition. O(1).
//! 2. Append-only: the cursor sat at the end when last drawn, no mid-buffer
//!    edit happened, and the drawn span set is prefix-compatible with the
//!    current one: print just the delta, styling at span boundaries.
//! 3. Full reflow: clean up the previously drawn block, reprint prompt and
//!    buffer, reposition the cursor.
//!
//! Invariant after any refresh: `drawn_cursor == buffer.cursor()`, the drawn
//! span snapshot equals the current spans, and the drawn end-of-line offset
//! equals the buffer length.
//!
//! All emission is queued crossterm commands (plus raw OSC-8 hyperlink
//! escapes) into any `io::Write`, so tests drive the engine against a
//! `Vec<u8>` sink.

mod engine;
mod paint;

pub use engine::RenderEngine;
