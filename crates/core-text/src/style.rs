//! Style spans and replacement masks over code-point offsets.
//!
//! Contract:
//! - All offsets are code-point indices into the owning buffer, never bytes.
//! - A [`SpanSet`] holds non-overlapping styled ranges in two ordered maps
//!   (start-indexed and end-indexed) so the render loop can ask "what starts
//!   or ends at column i" without scanning.
//! - Anchored sets are relocated through the pure [`relocate`] pass when the
//!   buffer is edited; plain sets keep literal offsets and are cleared on
//!   whole-buffer replacement.

use std::collections::BTreeMap;

/// Half-open code-point range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Ansi(u8),
    Rgb { r: u8, g: u8, b: u8 },
}

/// Text attributes applied over a span. Unset fields inherit whatever is
/// already in effect; `merge` layers a new style on top of an existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub underline: bool,
    pub italic: bool,
    pub hyperlink: Option<String>,
}

impl Style {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: &Style) {
        if other.fg.is_some() {
            self.fg = other.fg;
        }
        if other.bg.is_some() {
            self.bg = other.bg;
        }
        self.bold |= other.bold;
        self.underline |= other.underline;
        self.italic |= other.italic;
        if other.hyperlink.is_some() {
            self.hyperlink = other.hyperlink.clone();
        }
    }

    pub fn merged(&self, other: &Style) -> Style {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}

/// An edit described for span relocation. The offset is the relocation hint:
/// the pre-edit cursor for insertions, the removal index for removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Insert { at: usize },
    Remove { at: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SpanBody {
    end: usize,
    style: Style,
}

/// Ordered, non-overlapping styled spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanSet {
    by_start: BTreeMap<usize, SpanBody>,
    // end offset -> start offset, kept in lockstep with `by_start`
    by_end: BTreeMap<usize, usize>,
}

impl SpanSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn clear(&mut self) {
        self.by_start.clear();
        self.by_end.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Span, &Style)> {
        self.by_start
            .iter()
            .map(|(&start, body)| (Span::new(start, body.end), &body.style))
    }

    /// The style covering offset `i`, if any.
    pub fn style_at(&self, i: usize) -> Option<&Style> {
        let (_, body) = self.by_start.range(..=i).next_back()?;
        (body.end > i).then_some(&body.style)
    }

    /// The style of a span starting exactly at `i`.
    pub fn starts_at(&self, i: usize) -> Option<&Style> {
        self.by_start.get(&i).map(|body| &body.style)
    }

    /// Whether some span ends (exclusively) at `i`.
    pub fn ends_at(&self, i: usize) -> bool {
        self.by_end.contains_key(&i)
    }

    fn insert_piece(&mut self, start: usize, end: usize, style: Style) {
        if start >= end {
            return;
        }
        self.by_end.insert(end, start);
        self.by_start.insert(start, SpanBody { end, style });
    }

    /// Merge `style` into `[span.start, span.end)`. Existing overlapping
    /// spans are split at the boundaries; covered pieces get the merged
    /// style, uncovered gaps inside the range get `style` alone.
    pub fn stylize(&mut self, span: Span, style: &Style) {
        if span.is_empty() {
            return;
        }
        let overlapping: Vec<(usize, SpanBody)> = self
            .by_start
            .range(..span.end)
            .filter(|(_, body)| body.end > span.start)
            .map(|(&s, body)| (s, body.clone()))
            .collect();
        for (s, body) in &overlapping {
            self.by_start.remove(s);
            self.by_end.remove(&body.end);
        }

        let mut cursor = span.start;
        for (s, body) in overlapping {
            if s > cursor {
                // gap inside the stylized range
                self.insert_piece(cursor, s, style.clone());
                cursor = s;
            }
            if s < span.start {
                // left remainder keeps its old style
                self.insert_piece(s, span.start, body.style.clone());
            }
            let mid_start = s.max(span.start);
            let mid_end = body.end.min(span.end);
            self.insert_piece(mid_start, mid_end, body.style.merged(style));
            if body.end > span.end {
                // right remainder keeps its old style
                self.insert_piece(span.end, body.end, body.style.clone());
            }
            cursor = cursor.max(mid_end);
        }
        if cursor < span.end {
            self.insert_piece(cursor, span.end, style.clone());
        }
    }

    /// Remove style coverage inside `[span.start, span.end)`, splitting
    /// overlapping spans at the boundaries.
    pub fn unstyle(&mut self, span: Span) {
        if span.is_empty() {
            return;
        }
        let overlapping: Vec<(usize, SpanBody)> = self
            .by_start
            .range(..span.end)
            .filter(|(_, body)| body.end > span.start)
            .map(|(&s, body)| (s, body.clone()))
            .collect();
        for (s, body) in overlapping {
            self.by_start.remove(&s);
            self.by_end.remove(&body.end);
            if s < span.start {
                self.insert_piece(s, span.start, body.style.clone());
            }
            if body.end > span.end {
                self.insert_piece(span.end, body.end, body.style);
            }
        }
    }

    /// Spans clipped to `[0, offset)`, empties dropped. Used for the
    /// prefix-compatibility check between drawn and current state.
    fn clipped(&self, offset: usize) -> Vec<(usize, usize, &Style)> {
        self.by_start
            .range(..offset)
            .map(|(&s, body)| (s, body.end.min(offset), &body.style))
            .filter(|(s, e, _)| s < e)
            .collect()
    }

    /// True when everything this set styles below `offset` is styled
    /// identically by `other`, i.e. the drawn state is a prefix of the
    /// current state and an append-only repaint is safe.
    pub fn contains_up_to_offset(&self, other: &SpanSet, offset: usize) -> bool {
        self.clipped(offset) == other.clipped(offset)
    }
}

/// Relocate anchored spans across one edit. Pure: returns the new set.
///
/// For each span `(s, e)` with hint `h`:
/// - `s >= h`: both boundaries shift by the edit delta; a span exactly
///   consumed by a removal becomes empty and is dropped.
/// - `s < h < e` (or `h <= e` for removals inside): only `e` shifts.
/// - otherwise the span is untouched.
pub fn relocate(spans: &SpanSet, edit: Edit) -> SpanSet {
    let mut out = SpanSet::new();
    for (span, style) in spans.iter() {
        let (s, e) = (span.start, span.end);
        let moved = match edit {
            Edit::Insert { at } => {
                if s >= at {
                    Some((s + 1, e + 1))
                } else if e > at {
                    Some((s, e + 1))
                } else {
                    Some((s, e))
                }
            }
            Edit::Remove { at } => {
                if s >= at {
                    // Both boundaries shift, pinned at the removal point so a
                    // span exactly consumed by the removal empties out below.
                    Some((s.max(at + 1) - 1, e - 1))
                } else if e > at {
                    Some((s, e - 1))
                } else {
                    Some((s, e))
                }
            }
        };
        if let Some((ns, ne)) = moved
            && ns < ne
        {
            out.stylize(Span::new(ns, ne), style);
        }
    }
    out
}

// -------------------------------------------------------------------------------------------------
// Masks
// -------------------------------------------------------------------------------------------------

/// Replacement policy for a masked range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub replacement: String,
    /// `true`: one replacement per covered code point (password-style).
    /// `false`: a single replacement for the whole range (placeholder-style).
    pub per_char: bool,
}

impl Mask {
    pub fn per_char(replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
            per_char: true,
        }
    }

    pub fn placeholder(replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
            per_char: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MaskBody {
    end: usize,
    mask: Mask,
}

/// Masked ranges keyed by start offset for O(log n) covering lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskSet {
    map: BTreeMap<usize, MaskBody>,
}

impl MaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Install `mask` over `span`, displacing any overlapping masks.
    pub fn set(&mut self, span: Span, mask: Mask) {
        if span.is_empty() {
            return;
        }
        let overlapping: Vec<usize> = self
            .map
            .range(..span.end)
            .filter(|(_, body)| body.end > span.start)
            .map(|(&s, _)| s)
            .collect();
        for s in overlapping {
            self.map.remove(&s);
        }
        self.map.insert(
            span.start,
            MaskBody {
                end: span.end,
                mask,
            },
        );
    }

    /// The mask covering `offset`, with its full range.
    pub fn covering(&self, offset: usize) -> Option<(Span, &Mask)> {
        let (&start, body) = self.map.range(..=offset).next_back()?;
        (body.end > offset).then_some((Span::new(start, body.end), &body.mask))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Span, &Mask)> {
        self.map
            .iter()
            .map(|(&s, body)| (Span::new(s, body.end), &body.mask))
    }
}

/// Plain and anchored spans for one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSet {
    pub plain: SpanSet,
    pub anchored: SpanSet,
}

impl StyleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.anchored.is_empty()
    }

    pub fn clear(&mut self) {
        self.plain.clear();
        self.anchored.clear();
    }

    /// Relocate the anchored set across one edit; plain spans keep their
    /// literal offsets.
    pub fn readjust_anchored(&mut self, edit: Edit) {
        if !self.anchored.is_empty() {
            self.anchored = relocate(&self.anchored, edit);
        }
    }

    /// Effective style at `i`: anchored layered over plain.
    pub fn style_at(&self, i: usize) -> Option<Style> {
        match (self.plain.style_at(i), self.anchored.style_at(i)) {
            (None, None) => None,
            (Some(p), None) => Some(p.clone()),
            (None, Some(a)) => Some(a.clone()),
            (Some(p), Some(a)) => Some(p.merged(a)),
        }
    }

    /// Whether any span boundary (either set) sits at offset `i`.
    pub fn boundary_at(&self, i: usize) -> bool {
        self.plain.starts_at(i).is_some()
            || self.plain.ends_at(i)
            || self.anchored.starts_at(i).is_some()
            || self.anchored.ends_at(i)
    }
}
