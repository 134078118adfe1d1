//! Grapheme cluster display width.
//!
//! A single authoritative function `egc_width` returns the terminal column
//! width for one grapheme cluster. No caller measures display width any other
//! way; segmentation happens once at the caller and we operate on an EGC
//! slice.
//!
//! The classifier is heuristic and biased toward over-estimating the width of
//! pictographic composites: an over-estimate costs a blank cell, an
//! under-estimate causes cursor drift that compounds across a wrapped line.

const ZWJ: char = '\u{200D}';
const KEYCAP_COMBINING: char = '\u{20E3}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_skin_tone_modifier(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

// Primary emoji blocks plus the Misc Symbols / Dingbats ranges where legacy
// emoji live. Small range checks instead of full Unicode property tables.
fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
        || ('\u{1AB0}'..='\u{1AFF}').contains(&c)
        || ('\u{1DC0}'..='\u{1DFF}').contains(&c)
        || ('\u{20D0}'..='\u{20FF}').contains(&c)
        || ('\u{FE20}'..='\u{FE2F}').contains(&c)
}

/// Return the display column width for a single grapheme cluster.
///
/// Precondition: `egc` is one grapheme cluster boundary slice. Control
/// characters report width 0 here; the metrics layer substitutes their
/// `^X` / `\xHH` masked rendering and accounts columns there.
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }

    let mut chars = egc.chars();
    let first = chars.next().unwrap_or('\0');
    let single = chars.next().is_none();

    if single {
        if first.is_control() {
            return 0;
        }
        let base = unicode_width::UnicodeWidthChar::width(first).unwrap_or(1) as u16;
        if is_extended_pictographic(first) {
            return base.max(2);
        }
        return base;
    }

    let mut count_ep = 0usize;
    let mut count_ri = 0usize;
    let mut has_zwj = false;
    let mut has_skin = false;
    let mut ends_with_keycap = false;
    let mut any_wide = false;
    let mut base_wide_or_emoji = false;
    let mut saw_base = false;
    let total = egc.chars().count();

    for (i, c) in egc.chars().enumerate() {
        if is_extended_pictographic(c) {
            count_ep += 1;
        }
        if is_regional_indicator(c) {
            count_ri += 1;
        }
        if c == ZWJ {
            has_zwj = true;
        }
        if is_skin_tone_modifier(c) {
            has_skin = true;
        }
        if c == KEYCAP_COMBINING && i == total - 1 {
            ends_with_keycap = true;
        }
        if unicode_width::UnicodeWidthChar::width(c).unwrap_or(1) == 2 {
            any_wide = true;
        }
        if !saw_base && !is_combining_mark(c) {
            saw_base = true;
            if is_extended_pictographic(c)
                || unicode_width::UnicodeWidthChar::width(c).unwrap_or(1) == 2
            {
                base_wide_or_emoji = true;
            }
        }
    }

    if ends_with_keycap
        || (count_ri == 2 && total == 2)
        || (has_zwj && count_ep >= 2)
        || (count_ep >= 1 && has_skin)
        || count_ep >= 1
        || count_ri >= 1
    {
        return 2;
    }
    if any_wide || base_wide_or_emoji {
        return 2;
    }
    1
}
