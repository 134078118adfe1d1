//! Text model for the line editor: a code-point buffer with cursor, styled
//! spans, replacement masks, and the metrics engine.
//!
//! Offsets everywhere in this crate are code-point indices into the buffer's
//! exact current sequence, never byte indices. The cursor satisfies
//! `0 <= cursor <= len()` at all times.

pub mod metrics;
pub mod style;
pub mod width;

pub use metrics::{LineMetric, MaskedRange, StringMetrics, metrics, metrics_indented};
pub use style::{Color, Edit, Mask, MaskSet, Span, SpanSet, Style, StyleSet, relocate};
pub use width::egc_width;

use std::borrow::Cow;
use unicode_normalization::{IsNormalized, UnicodeNormalization, is_nfc_quick};

/// NFC-normalize text arriving from outside the keyboard path (pastes,
/// completion sources) before insertion, so buffer offsets count composed
/// code points the same way the terminal will render them.
pub fn normalize_for_insert(input: &str) -> Cow<'_, str> {
    match is_nfc_quick(input.chars()) {
        IsNormalized::Yes => Cow::Borrowed(input),
        _ => Cow::Owned(input.nfc().collect()),
    }
}

/// The editable line: an ordered sequence of Unicode code points plus the
/// logical cursor and the style/mask state that decorates it.
///
/// Mutations relocate anchored spans *before* touching the index space those
/// spans refer to, using the edit position as the relocation hint.
#[derive(Debug, Default)]
pub struct LineBuffer {
    chars: Vec<char>,
    cursor: usize,
    styles: StyleSet,
    masks: MaskSet,
    newline_count: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the empty state at the start of an edit session.
    pub fn reset(&mut self) {
        self.chars.clear();
        self.cursor = 0;
        self.styles.clear();
        self.masks.clear();
        self.newline_count = 0;
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Count of `\n` code points currently in the buffer, maintained across
    /// edits for scroll bookkeeping.
    pub fn newline_count(&self) -> usize {
        self.newline_count
    }

    pub fn char_at(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn text_range(&self, span: Span) -> String {
        let end = span.end.min(self.chars.len());
        let start = span.start.min(end);
        self.chars[start..end].iter().collect()
    }

    pub fn text_up_to_cursor(&self) -> String {
        self.chars[..self.cursor].iter().collect()
    }

    pub fn styles(&self) -> &StyleSet {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleSet {
        &mut self.styles
    }

    pub fn masks(&self) -> &MaskSet {
        &self.masks
    }

    pub fn set_cursor(&mut self, i: usize) {
        self.cursor = i.min(self.chars.len());
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor < self.chars.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// Start of the word before the cursor: skip trailing whitespace, then
    /// the word itself.
    pub fn prev_word_start(&self) -> usize {
        let mut i = self.cursor;
        while i > 0 && self.chars[i - 1].is_whitespace() {
            i -= 1;
        }
        while i > 0 && !self.chars[i - 1].is_whitespace() {
            i -= 1;
        }
        i
    }

    /// End of the word at/after the cursor.
    pub fn next_word_end(&self) -> usize {
        let n = self.chars.len();
        let mut i = self.cursor;
        while i < n && self.chars[i].is_whitespace() {
            i += 1;
        }
        while i < n && !self.chars[i].is_whitespace() {
            i += 1;
        }
        i
    }

    pub fn move_word_left(&mut self) {
        self.cursor = self.prev_word_start();
    }

    pub fn move_word_right(&mut self) {
        self.cursor = self.next_word_end();
    }

    /// Insert at the cursor, then advance past the inserted code point.
    pub fn insert(&mut self, ch: char) {
        // Relocation first: spans must see the pre-edit index space, with the
        // pre-insert cursor as the hint.
        self.styles.readjust_anchored(Edit::Insert { at: self.cursor });
        self.chars.insert(self.cursor, ch);
        if ch == '\n' {
            self.newline_count += 1;
        }
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.insert(ch);
        }
    }

    /// Remove the code point at `index`, relocating anchored spans with
    /// `index` as the hint before the index space changes.
    pub fn remove_at(&mut self, index: usize) -> Option<char> {
        if index >= self.chars.len() {
            return None;
        }
        self.styles.readjust_anchored(Edit::Remove { at: index });
        let removed = self.chars.remove(index);
        if removed == '\n' {
            self.newline_count -= 1;
        }
        if self.cursor > index {
            self.cursor -= 1;
        }
        Some(removed)
    }

    pub fn backspace(&mut self) -> Option<char> {
        if self.cursor == 0 {
            return None;
        }
        self.remove_at(self.cursor - 1)
    }

    pub fn delete_forward(&mut self) -> Option<char> {
        self.remove_at(self.cursor)
    }

    fn remove_range(&mut self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let mut out = String::with_capacity(end.saturating_sub(start));
        for _ in start..end {
            match self.remove_at(start) {
                Some(c) => out.push(c),
                None => break,
            }
        }
        out
    }

    /// Delete from the cursor to the end of the buffer, returning the
    /// removed text.
    pub fn kill_to_end(&mut self) -> String {
        self.remove_range(self.cursor, self.chars.len())
    }

    /// Delete from the start of the buffer to the cursor.
    pub fn kill_to_start(&mut self) -> String {
        self.remove_range(0, self.cursor)
    }

    pub fn kill_word_back(&mut self) -> String {
        let start = self.prev_word_start();
        self.remove_range(start, self.cursor)
    }

    pub fn kill_word_forward(&mut self) -> String {
        let end = self.next_word_end();
        self.remove_range(self.cursor, end)
    }

    /// Replace the whole buffer (history recall). This is a full buffer
    /// change: literal-offset spans are meaningless afterwards and anchored
    /// spans have nothing to relocate against, so both sets are cleared.
    pub fn replace_all(&mut self, text: &str) {
        self.chars.clear();
        self.styles.clear();
        self.newline_count = 0;
        for ch in text.chars() {
            self.chars.push(ch);
            if ch == '\n' {
                self.newline_count += 1;
            }
        }
        self.cursor = self.chars.len();
    }

    /// Take the buffer's text, resetting the session state.
    pub fn take_text(&mut self) -> String {
        let text = self.text();
        self.reset();
        text
    }

    /// Merge `style` into the plain span set over `span`.
    pub fn stylize(&mut self, span: Span, style: &Style) {
        self.styles.plain.stylize(span, style);
    }

    /// Merge `style` into the anchored span set; the region follows the text
    /// it decorates across subsequent edits.
    pub fn stylize_anchored(&mut self, span: Span, style: &Style) {
        self.styles.anchored.stylize(span, style);
    }

    pub fn set_mask(&mut self, span: Span, mask: Mask) {
        self.masks.set(span, mask);
    }

    /// Metrics of the full buffer content.
    pub fn metrics(&self, max_line_width: Option<usize>) -> StringMetrics {
        metrics(&self.text(), Some(&self.masks), max_line_width)
    }
}
