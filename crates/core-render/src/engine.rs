use crossterm::{
    cursor::{MoveDown, MoveTo, MoveToColumn, MoveUp},
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use tracing::{debug, trace};

use core_text::{LineBuffer, StyleSet, metrics, metrics_indented};

use crate::paint::paint_buffer;

/// Row/column layout of the prompt+buffer block under the current width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    total_rows: usize,
    cursor_row: usize,
    cursor_col: usize,
    end_row: usize,
    end_col: usize,
    prompt_end_col: usize,
}

/// Tracks what the terminal currently shows and reconverges it with the
/// buffer on every `refresh`.
#[derive(Debug)]
pub struct RenderEngine {
    cols: u16,
    rows: u16,

    has_drawn: bool,
    drawn_prompt: String,
    drawn_text: String,
    drawn_cursor: usize,
    /// `drawn_end_of_line_offset`: code points drawn so far.
    drawn_text_len: usize,
    drawn_spans: StyleSet,
    drawn_rows: usize,
    drawn_cursor_row: usize,
    drawn_cursor_col: usize,

    /// Mid-buffer edits since the last draw; nonzero disables the
    /// append-only path.
    chars_touched_in_middle: usize,
    /// Set by resize/clear: the next refresh must reflow.
    force_reflow: bool,
    /// Absolute origin row (0-based) when known via DSR or clear-screen.
    origin_row: Option<u16>,
    /// A resize invalidated the origin; the editor should issue a DSR query
    /// at the next safe point.
    want_origin_query: bool,
}

impl RenderEngine {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(1),
            rows,
            has_drawn: false,
            drawn_prompt: String::new(),
            drawn_text: String::new(),
            drawn_cursor: 0,
            drawn_text_len: 0,
            drawn_spans: StyleSet::new(),
            drawn_rows: 0,
            drawn_cursor_row: 0,
            drawn_cursor_col: 0,
            chars_touched_in_middle: 0,
            force_reflow: false,
            origin_row: None,
            want_origin_query: false,
        }
    }

    pub fn drawn_cursor(&self) -> usize {
        self.drawn_cursor
    }

    pub fn drawn_rows(&self) -> usize {
        self.drawn_rows
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Record an edit at code-point `index`. Edits below the drawn end
    /// disqualify the append-only fast path until the next full draw.
    pub fn note_edit(&mut self, index: usize) {
        if self.has_drawn && index < self.drawn_text_len {
            self.chars_touched_in_middle += 1;
        }
    }

    /// Force the next refresh onto the reflow path.
    pub fn invalidate(&mut self) {
        self.force_reflow = true;
    }

    /// The terminal was resized. The previously derived origin is invalid
    /// (rewrapping moved the block), so estimate the cursor row from old
    /// content under the new width and ask for a DSR correction.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols.max(1);
        self.rows = rows;
        if self.has_drawn {
            let width = self.cols as usize;
            let prompt_m = metrics(&self.drawn_prompt, None, Some(width));
            let prefix: String = self.drawn_text.chars().take(self.drawn_cursor).collect();
            let prefix_m =
                metrics_indented(&prefix, None, Some(width), prompt_m.last_visible());
            self.drawn_cursor_row = prompt_m.lines_with_addition(&prefix_m) - 1;
            self.drawn_cursor_col = prefix_m.last_visible();
            debug!(
                target: "render.resize",
                cols,
                rows,
                estimated_row = self.drawn_cursor_row,
                "origin_estimated"
            );
        }
        self.origin_row = None;
        self.want_origin_query = true;
        self.force_reflow = true;
    }

    pub fn wants_origin_query(&self) -> bool {
        self.want_origin_query
    }

    /// Apply a DSR cursor-position report (1-based row/col): the cursor we
    /// hold corresponds to `drawn_cursor_row` inside the block, which pins
    /// the absolute origin.
    pub fn apply_cursor_report(&mut self, row: u16, _col: u16) {
        let row0 = row.saturating_sub(1);
        self.origin_row = Some(row0.saturating_sub(self.drawn_cursor_row as u16));
        self.want_origin_query = false;
        debug!(target: "render.resize", origin = ?self.origin_row, "origin_corrected");
    }

    /// Clear the whole screen and park the block origin at the top-left.
    pub fn clear_screen<W: Write>(&mut self, w: &mut W) -> io::Result<()> {
        queue!(w, Clear(ClearType::All), MoveTo(0, 0))?;
        self.has_drawn = false;
        self.origin_row = Some(0);
        self.force_reflow = true;
        Ok(())
    }

    fn layout(&self, prompt: &str, buffer: &LineBuffer) -> Layout {
        let width = self.cols as usize;
        let prompt_m = metrics(prompt, None, Some(width));
        let indent = prompt_m.last_visible();
        let full_m = metrics_indented(&buffer.text(), Some(buffer.masks()), Some(width), indent);
        let prefix_m = metrics_indented(
            &buffer.text_up_to_cursor(),
            Some(buffer.masks()),
            Some(width),
            indent,
        );
        Layout {
            total_rows: prompt_m.lines_with_addition(&full_m),
            cursor_row: prompt_m.lines_with_addition(&prefix_m) - 1,
            cursor_col: prefix_m.last_visible(),
            end_row: prompt_m.lines_with_addition(&full_m) - 1,
            end_col: full_m.last_visible(),
            prompt_end_col: indent,
        }
    }

    fn move_cursor_between<W: Write>(
        &self,
        w: &mut W,
        from_row: usize,
        to_row: usize,
        to_col: usize,
    ) -> io::Result<()> {
        if to_row < from_row {
            queue!(w, MoveUp((from_row - to_row) as u16))?;
        } else if to_row > from_row {
            queue!(w, MoveDown((to_row - from_row) as u16))?;
        }
        queue!(w, MoveToColumn(to_col.min(u16::MAX as usize) as u16))
    }

    /// Erase the previously drawn block: reposition to the block origin and
    /// clear downward, covering any shrinkage against the prior line count.
    fn cleanup<W: Write>(&mut self, w: &mut W) -> io::Result<()> {
        if let (Some(origin), true) = (self.origin_row, self.force_reflow) {
            // Absolute origin known (DSR or clear-screen): go straight there.
            queue!(w, MoveTo(0, origin))?;
        } else if self.has_drawn {
            queue!(w, MoveToColumn(0))?;
            if self.drawn_cursor_row > 0 {
                queue!(w, MoveUp(self.drawn_cursor_row as u16))?;
            }
        } else {
            queue!(w, MoveToColumn(0))?;
        }
        trace!(target: "render.path", erased_rows = self.drawn_rows, "cleanup");
        queue!(w, Clear(ClearType::FromCursorDown))
    }

    /// Reconverge the terminal with the buffer. Decides between a pure
    /// cursor move, the append-only fast path, and a full reflow.
    pub fn refresh<W: Write>(
        &mut self,
        w: &mut W,
        prompt: &str,
        buffer: &LineBuffer,
    ) -> io::Result<()> {
        let layout = self.layout(prompt, buffer);
        let text = buffer.text();
        let spans_now = buffer.styles().clone();

        let unchanged = self.has_drawn
            && !self.force_reflow
            && prompt == self.drawn_prompt
            && text == self.drawn_text
            && spans_now == self.drawn_spans;

        if unchanged {
            if layout.cursor_row != self.drawn_cursor_row
                || layout.cursor_col != self.drawn_cursor_col
            {
                trace!(target: "render.path", "cursor_move");
                self.move_cursor_between(
                    w,
                    self.drawn_cursor_row,
                    layout.cursor_row,
                    layout.cursor_col,
                )?;
                w.flush()?;
            } else {
                trace!(target: "render.path", "noop");
            }
            self.commit(prompt, text, buffer, layout);
            return Ok(());
        }

        let append_ok = self.has_drawn
            && !self.force_reflow
            && prompt == self.drawn_prompt
            && self.chars_touched_in_middle == 0
            && buffer.cursor() == buffer.len()
            && buffer.len() >= self.drawn_text_len
            && self.drawn_cursor == self.drawn_text_len
            && text.chars().count() >= self.drawn_text_len
            && text.chars().take(self.drawn_text.chars().count()).collect::<String>()
                == self.drawn_text
            && self
                .drawn_spans
                .plain
                .contains_up_to_offset(&spans_now.plain, self.drawn_cursor)
            && self
                .drawn_spans
                .anchored
                .contains_up_to_offset(&spans_now.anchored, self.drawn_cursor);

        if append_ok {
            trace!(
                target: "render.path",
                appended = buffer.len() - self.drawn_text_len,
                "append"
            );
            paint_buffer(w, buffer, self.drawn_text_len, self.drawn_cursor_col)?;
        } else {
            trace!(target: "render.path", rows = layout.total_rows, "reflow");
            self.cleanup(w)?;
            queue!(w, Print(prompt))?;
            paint_buffer(w, buffer, 0, layout.prompt_end_col)?;
            // The paint leaves the terminal cursor at the end of the buffer;
            // walk it back to the logical cursor.
            self.move_cursor_between(w, layout.end_row, layout.cursor_row, layout.cursor_col)?;
        }
        w.flush()?;
        self.commit(prompt, text, buffer, layout);
        Ok(())
    }

    fn commit(&mut self, prompt: &str, text: String, buffer: &LineBuffer, layout: Layout) {
        self.has_drawn = true;
        self.drawn_prompt = prompt.to_string();
        self.drawn_text = text;
        self.drawn_cursor = buffer.cursor();
        self.drawn_text_len = buffer.len();
        self.drawn_spans = buffer.styles().clone();
        self.drawn_rows = layout.total_rows;
        self.drawn_cursor_row = layout.cursor_row;
        self.drawn_cursor_col = layout.cursor_col;
        self.chars_touched_in_middle = 0;
        self.force_reflow = false;
        debug_assert_eq!(self.drawn_cursor, buffer.cursor());
        debug_assert_eq!(self.drawn_text_len, buffer.len());
    }

    /// End the edit session visually: park the cursor after the block and
    /// emit a line break so subsequent output starts on a fresh row. Drawn
    /// state resets for the next session.
    pub fn finalize_line<W: Write>(&mut self, w: &mut W) -> io::Result<()> {
        if self.has_drawn && self.drawn_rows > self.drawn_cursor_row + 1 {
            queue!(
                w,
                MoveDown((self.drawn_rows - 1 - self.drawn_cursor_row) as u16)
            )?;
        }
        queue!(w, Print("\r\n"))?;
        w.flush()?;
        *self = Self::new(self.cols, self.rows);
        Ok(())
    }
}
