//! Rendered-size computation for arbitrary text, without drawing it.
//!
//! `metrics` answers "how many terminal rows and columns will this text
//! occupy" for the render engine, cursor placement, and wrap math. It walks
//! grapheme cluster boundaries (a multi-code-point glyph counts once), skips
//! embedded CSI/OSC escape sequences at zero width, expands tabs, accounts
//! control characters at their `^X` / `\xHH` masked rendering, applies
//! replacement masks, and inserts synthetic soft-wrap breaks against an
//! optional maximum line width.
//!
//! Invariant: a line's `visible_length` is monotonic in the number of
//! non-escape, non-zero-width code points rendered.

use crate::style::MaskSet;
use crate::width::egc_width;
use unicode_segmentation::UnicodeSegmentation;

const TAB_STOP: usize = 8;

/// A sub-range of one line rendered as a substitute (control-char caret
/// notation or an installed mask), consuming `columns` cells rather than the
/// range's natural width. Offsets are line-relative code-point indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedRange {
    pub start: usize,
    pub end: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMetric {
    /// Code points on this line (escape sequence bytes included).
    pub length: usize,
    /// Terminal columns the line occupies once rendered.
    pub visible_length: usize,
    /// Ranges rendered via substitution.
    pub masked: Vec<MaskedRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMetrics {
    pub lines: Vec<LineMetric>,
    pub max_line_length: usize,
    /// Code-point indices at grapheme cluster starts, for cluster-safe
    /// iteration without re-segmenting.
    pub grapheme_starts: Vec<usize>,
}

impl StringMetrics {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn last_visible(&self) -> usize {
        self.lines.last().map(|l| l.visible_length).unwrap_or(0)
    }

    /// Total rows when `cont` is rendered immediately after `self` (the
    /// continuation's first line extends this text's last line).
    pub fn lines_with_addition(&self, cont: &StringMetrics) -> usize {
        self.line_count() + cont.line_count() - 1
    }

    /// Final column when `cont` is rendered immediately after `self`. When
    /// the continuation was measured with [`metrics_indented`] (wrap-aware
    /// composition) use its `last_visible()` directly instead.
    pub fn offset_with_addition(&self, cont: &StringMetrics) -> usize {
        if cont.line_count() > 1 {
            cont.last_visible()
        } else {
            self.last_visible() + cont.last_visible()
        }
    }
}

// Recognizer for escape sequences embedded in measured text. Styled
// substrings injected by masks/spans carry their own SGR/OSC escapes, which
// must measure at zero width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnsiState {
    Free,
    Escape,
    /// CSI body: parameters, intermediates, then a final byte.
    Bracket,
    /// Right after `ESC ]`, before we know which OSC this is.
    OscStart,
    /// OSC title (or any non-hyperlink OSC); `st` = saw ESC, expecting `\`.
    Title { st: bool },
    /// OSC 8 hyperlink.
    Url { st: bool },
}

fn ansi_step(state: AnsiState, c: char) -> AnsiState {
    use AnsiState::*;
    match state {
        Free => Free, // caller only feeds non-Free states or the ESC intro
        Escape => match c {
            '[' => Bracket,
            ']' => OscStart,
            _ => Free,
        },
        Bracket => match c as u32 {
            0x20..=0x3f => Bracket,
            0x40..=0x7e => Free,
            _ => Free, // malformed: drop out rather than swallow text
        },
        OscStart => match c {
            '8' => Url { st: false },
            '\u{7}' => Free,
            _ => Title { st: false },
        },
        Title { st } => osc_step(c, st, |st| Title { st }),
        Url { st } => osc_step(c, st, |st| Url { st }),
    }
}

fn osc_step(c: char, st: bool, wrap: impl Fn(bool) -> AnsiState) -> AnsiState {
    match (st, c) {
        (_, '\u{7}') => AnsiState::Free,
        (true, '\\') => AnsiState::Free,
        (_, '\u{1b}') => wrap(true),
        _ => wrap(false),
    }
}

struct LineAccum {
    line: LineMetric,
    lines: Vec<LineMetric>,
    max_width: Option<usize>,
}

impl LineAccum {
    fn new(max_width: Option<usize>, indent: usize) -> Self {
        Self {
            line: LineMetric {
                visible_length: indent,
                ..LineMetric::default()
            },
            lines: Vec::new(),
            max_width,
        }
    }

    /// Soft-wrap before `add` columns would exceed the width limit.
    fn fit(&mut self, add: usize) {
        if let Some(w) = self.max_width
            && self.line.visible_length + add > w
            && self.line.visible_length > 0
        {
            self.break_line();
        }
    }

    fn break_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.line));
    }

    fn push_masked(&mut self, cp_len: usize, columns: usize) {
        self.fit(columns);
        self.line.masked.push(MaskedRange {
            start: self.line.length,
            end: self.line.length + cp_len,
            columns,
        });
        self.line.length += cp_len;
        self.line.visible_length += columns;
    }

    fn push_visible(&mut self, cp_len: usize, columns: usize) {
        self.fit(columns);
        self.line.length += cp_len;
        self.line.visible_length += columns;
    }

    fn finish(mut self) -> Vec<LineMetric> {
        self.lines.push(self.line);
        self.lines
    }
}

/// Measure `text`. See [`metrics_indented`] for composition with a prefix.
pub fn metrics(
    text: &str,
    masks: Option<&MaskSet>,
    max_line_width: Option<usize>,
) -> StringMetrics {
    metrics_indented(text, masks, max_line_width, 0)
}

/// Measure `text` as a continuation starting at column `indent` (columns
/// already consumed on the first row, e.g. by the prompt). The first line's
/// `visible_length` includes the indent; `length` never does.
pub fn metrics_indented(
    text: &str,
    masks: Option<&MaskSet>,
    max_line_width: Option<usize>,
    indent: usize,
) -> StringMetrics {
    let mut accum = LineAccum::new(max_line_width, indent);
    let mut grapheme_starts = Vec::new();
    let mut ansi = AnsiState::Free;
    let mut cp_index = 0usize;

    for g in text.graphemes(true) {
        grapheme_starts.push(cp_index);
        let cp_len = g.chars().count();

        // CRLF segments as a single cluster: carriage return then newline is
        // just a line break.
        if g == "\r\n" {
            accum.break_line();
            cp_index += 2;
            continue;
        }

        // Inside an escape sequence: zero width, code points still counted.
        if ansi != AnsiState::Free {
            for c in g.chars() {
                ansi = ansi_step(ansi, c);
            }
            accum.line.length += cp_len;
            cp_index += cp_len;
            continue;
        }

        // An installed mask overrides rendering for the covered range.
        if let Some((span, mask)) = masks.and_then(|m| m.covering(cp_index)) {
            let repl_cols: usize = mask
                .replacement
                .graphemes(true)
                .map(|r| egc_width(r) as usize)
                .sum();
            for _ in g.chars() {
                let cols = if cp_index >= span.end {
                    // mask boundary fell inside this cluster; the remainder
                    // of a split cluster is unrenderable and measures zero
                    0
                } else if mask.per_char || cp_index == span.start {
                    repl_cols
                } else {
                    0
                };
                if cols > 0 {
                    accum.push_masked(1, cols);
                } else {
                    accum.line.length += 1;
                }
                cp_index += 1;
            }
            continue;
        }

        match g {
            "\n" => {
                accum.break_line();
                cp_index += 1;
            }
            "\r" => {
                // Overwrite semantics: the carriage returns to column 0 and
                // the line starts over.
                accum.line = LineMetric::default();
                cp_index += 1;
            }
            "\t" => {
                let target = (accum.line.visible_length / TAB_STOP + 1) * TAB_STOP;
                let add = target - accum.line.visible_length;
                accum.fit(add);
                let target = (accum.line.visible_length / TAB_STOP + 1) * TAB_STOP;
                accum.line.visible_length = target;
                accum.line.length += 1;
                cp_index += 1;
            }
            _ if cp_len == 1 && g.chars().next().is_some_and(char::is_control) => {
                let c = g.chars().next().unwrap_or('\0');
                if c == '\u{1b}' {
                    ansi = AnsiState::Escape;
                    accum.line.length += 1;
                } else {
                    // ^X caret form for C0/DEL, \xHH for C1.
                    let cols = if (c as u32) < 0x80 { 2 } else { 4 };
                    accum.push_masked(1, cols);
                }
                cp_index += 1;
            }
            _ => {
                accum.push_visible(cp_len, egc_width(g) as usize);
                cp_index += cp_len;
            }
        }
    }

    let lines = accum.finish();
    let max_line_length = lines.iter().map(|l| l.length).max().unwrap_or(0);
    StringMetrics {
        lines,
        max_line_length,
        grapheme_starts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Mask, MaskSet, Span};

    #[test]
    fn plain_ascii_line() {
        let m = metrics("hello world", None, None);
        assert_eq!(m.line_count(), 1);
        assert_eq!(m.lines[0].length, 11);
        assert_eq!(m.lines[0].visible_length, 11);
        assert_eq!(m.max_line_length, 11);
    }

    #[test]
    fn newline_splits_lines() {
        let m = metrics("ab\ncdef", None, None);
        assert_eq!(m.line_count(), 2);
        assert_eq!(m.lines[0].visible_length, 2);
        assert_eq!(m.lines[1].visible_length, 4);
    }

    #[test]
    fn carriage_return_resets_line() {
        let m = metrics("abcdef\rxy", None, None);
        assert_eq!(m.line_count(), 1);
        assert_eq!(m.lines[0].length, 2);
        assert_eq!(m.lines[0].visible_length, 2);
    }

    #[test]
    fn crlf_is_one_break() {
        let m = metrics("ab\r\ncd", None, None);
        assert_eq!(m.line_count(), 2);
        assert_eq!(m.lines[0].visible_length, 2);
        assert_eq!(m.lines[1].visible_length, 2);
    }

    #[test]
    fn tab_advances_to_stop() {
        let m = metrics("a\tb", None, None);
        assert_eq!(m.lines[0].visible_length, 9);
        let m = metrics("\t\t", None, None);
        assert_eq!(m.lines[0].visible_length, 16);
    }

    #[test]
    fn control_chars_render_masked() {
        let m = metrics("a\u{7}b", None, None);
        assert_eq!(m.lines[0].visible_length, 4); // a + ^G + b
        assert_eq!(
            m.lines[0].masked,
            vec![MaskedRange {
                start: 1,
                end: 2,
                columns: 2
            }]
        );
        // C1 controls render as \xHH
        let m = metrics("\u{85}", None, None);
        assert_eq!(m.lines[0].visible_length, 4);
    }

    #[test]
    fn sgr_escapes_are_zero_width() {
        let m = metrics("a\u{1b}[31mb\u{1b}[0m", None, None);
        assert_eq!(m.lines[0].visible_length, 2);
    }

    #[test]
    fn osc_hyperlink_is_zero_width() {
        let text = "\u{1b}]8;;http://example.test\u{1b}\\link\u{1b}]8;;\u{1b}\\";
        let m = metrics(text, None, None);
        assert_eq!(m.lines[0].visible_length, 4);
    }

    #[test]
    fn osc_title_bel_terminated() {
        let m = metrics("\u{1b}]0;window title\u{7}hi", None, None);
        assert_eq!(m.lines[0].visible_length, 2);
    }

    #[test]
    fn wide_cluster_counts_once() {
        let m = metrics("a👨‍👩‍👧‍👦b", None, None);
        assert_eq!(m.lines[0].visible_length, 4); // 1 + 2 + 1
        assert_eq!(m.grapheme_starts.len(), 3);
    }

    #[test]
    fn soft_wrap_inserts_synthetic_breaks() {
        let m = metrics("abcdefgh", None, Some(3));
        assert_eq!(m.line_count(), 3);
        assert_eq!(m.lines[0].visible_length, 3);
        assert_eq!(m.lines[1].visible_length, 3);
        assert_eq!(m.lines[2].visible_length, 2);
    }

    #[test]
    fn wide_cluster_never_splits_at_wrap() {
        // 2-wide cluster at an odd boundary wraps whole.
        let m = metrics("a界界", None, Some(3));
        assert_eq!(m.line_count(), 2);
        assert_eq!(m.lines[0].visible_length, 3);
        assert_eq!(m.lines[1].visible_length, 2);
    }

    #[test]
    fn indent_composes_with_wrap() {
        let m = metrics_indented("abc", None, Some(4), 3);
        assert_eq!(m.line_count(), 2);
        assert_eq!(m.lines[0].visible_length, 4); // indent 3 + 'a'
        assert_eq!(m.lines[1].visible_length, 2); // 'b' 'c'
        assert_eq!(m.lines[0].length, 1);
    }

    #[test]
    fn per_char_mask_substitutes_each_point() {
        let mut masks = MaskSet::new();
        masks.set(Span::new(0, 6), Mask::per_char("*"));
        let m = metrics("secret", Some(&masks), None);
        assert_eq!(m.lines[0].visible_length, 6);
        assert_eq!(m.lines[0].masked.len(), 6);
    }

    #[test]
    fn placeholder_mask_substitutes_once() {
        let mut masks = MaskSet::new();
        masks.set(Span::new(2, 6), Mask::placeholder("<>"));
        let m = metrics("abcdefgh", Some(&masks), None);
        // a b <> g h
        assert_eq!(m.lines[0].visible_length, 2 + 2 + 2);
    }

    #[test]
    fn additivity_of_line_counts() {
        let cases = [("abc", "def"), ("a\nb", "c"), ("a", "b\nc\nd"), ("", "")];
        for (a, b) in cases {
            let whole = metrics(&format!("{a}{b}"), None, None);
            let ma = metrics(a, None, None);
            let mb = metrics(b, None, None);
            assert_eq!(
                ma.lines_with_addition(&mb),
                whole.line_count(),
                "additivity failed for {a:?} + {b:?}"
            );
            assert_eq!(
                ma.offset_with_addition(&mb),
                whole.last_visible(),
                "offset additivity failed for {a:?} + {b:?}"
            );
        }
    }

    #[test]
    fn visible_length_monotonic_under_append() {
        let mut prev = 0;
        let base = "abc界e\u{301}";
        let mut s = String::new();
        for g in ["x", "y", "界", "z"] {
            s = format!("{base}{s}{g}");
            let m = metrics(&s, None, None);
            assert!(m.lines[0].visible_length >= prev);
            prev = m.lines[0].visible_length;
        }
    }
}
