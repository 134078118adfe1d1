//! Styled content emission: code points → terminal bytes, applying span
//! styles at their boundaries and substituting masked ranges.

use crossterm::{
    queue,
    style::{Attribute, Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
};
use std::io::{self, Write};
use unicode_segmentation::UnicodeSegmentation;

use core_text::{Color, LineBuffer, Style, egc_width};

const TAB_STOP: usize = 8;

fn term_color(c: Color) -> crossterm::style::Color {
    match c {
        Color::Ansi(n) => crossterm::style::Color::AnsiValue(n),
        Color::Rgb { r, g, b } => crossterm::style::Color::Rgb { r, g, b },
    }
}

/// Open `style`: reset, then apply each attribute. Returns whether an OSC-8
/// hyperlink was opened (it needs an explicit close).
pub(crate) fn open_style<W: Write>(w: &mut W, style: &Style) -> io::Result<bool> {
    queue!(w, SetAttribute(Attribute::Reset))?;
    if style.bold {
        queue!(w, SetAttribute(Attribute::Bold))?;
    }
    if style.underline {
        queue!(w, SetAttribute(Attribute::Underlined))?;
    }
    if style.italic {
        queue!(w, SetAttribute(Attribute::Italic))?;
    }
    if let Some(fg) = style.fg {
        queue!(w, SetForegroundColor(term_color(fg)))?;
    }
    if let Some(bg) = style.bg {
        queue!(w, SetBackgroundColor(term_color(bg)))?;
    }
    if let Some(url) = &style.hyperlink {
        write!(w, "\x1b]8;;{url}\x1b\\")?;
        return Ok(true);
    }
    Ok(false)
}

pub(crate) fn close_style<W: Write>(w: &mut W, had_link: bool) -> io::Result<()> {
    if had_link {
        write!(w, "\x1b]8;;\x1b\\")?;
    }
    queue!(w, SetAttribute(Attribute::Reset))
}

/// Paint buffer content from code-point offset `from`, starting at terminal
/// column `start_col`. Returns the column after the last emitted cell
/// (the caller tracks wrapping via metrics).
pub(crate) fn paint_buffer<W: Write>(
    w: &mut W,
    buffer: &LineBuffer,
    from: usize,
    start_col: usize,
) -> io::Result<()> {
    let text = buffer.text();
    let styles = buffer.styles();
    let masks = buffer.masks();

    // Cluster list with code-point offsets, so style/mask boundaries (which
    // are code-point indexed) line up with what gets printed.
    let clusters: Vec<(usize, &str)> = {
        let mut cp = 0usize;
        text.graphemes(true)
            .map(|g| {
                let start = cp;
                cp += g.chars().count();
                (start, g)
            })
            .collect()
    };

    let mut col = start_col;
    let mut active: Option<Style> = None;
    let mut open_link = false;
    let mut idx = clusters.partition_point(|(start, _)| *start < from);

    while idx < clusters.len() {
        let (cp_start, cluster) = clusters[idx];

        // Style boundary?
        let want = styles.style_at(cp_start);
        if want != active {
            if active.is_some() {
                close_style(w, open_link)?;
            }
            open_link = match &want {
                Some(style) => open_style(w, style)?,
                None => false,
            };
            active = want;
        }

        // Masked range?
        if let Some((span, mask)) = masks.covering(cp_start) {
            let cp_end = cp_start + cluster.chars().count();
            for cp in cp_start..cp_end.min(span.end) {
                if mask.per_char || cp == span.start {
                    queue!(w, Print(&mask.replacement))?;
                    col += mask
                        .replacement
                        .graphemes(true)
                        .map(|g| egc_width(g) as usize)
                        .sum::<usize>();
                }
            }
            idx += 1;
            continue;
        }

        match cluster {
            "\n" | "\r\n" => {
                queue!(w, Print("\r\n"))?;
                col = 0;
            }
            "\r" => {
                queue!(w, Print("\r"))?;
                col = 0;
            }
            "\t" => {
                // Expand to spaces so the drawn width matches the metrics
                // engine's tab-stop accounting.
                let target = (col / TAB_STOP + 1) * TAB_STOP;
                queue!(w, Print(" ".repeat(target - col)))?;
                col = target;
            }
            _ if cluster.chars().count() == 1
                && cluster.chars().next().is_some_and(char::is_control) =>
            {
                let c = cluster.chars().next().unwrap_or('\0');
                let rendered = control_rendering(c);
                col += rendered.chars().count();
                queue!(w, Print(rendered))?;
            }
            _ => {
                queue!(w, Print(cluster))?;
                col += egc_width(cluster) as usize;
            }
        }
        idx += 1;
    }

    if active.is_some() {
        close_style(w, open_link)?;
    }
    Ok(())
}

/// `^X` caret form for C0/DEL, `\xHH` for other control code points,
/// mirroring the masked-width rules in the metrics engine.
pub(crate) fn control_rendering(c: char) -> String {
    match c as u32 {
        n @ 0..=0x1f => format!("^{}", char::from((n as u8) + 0x40)),
        0x7f => "^?".to_string(),
        n => format!("\\x{:02X}", n & 0xff),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::{Mask, Span};

    #[test]
    fn control_renderings() {
        assert_eq!(control_rendering('\u{1}'), "^A");
        assert_eq!(control_rendering('\u{7f}'), "^?");
        assert_eq!(control_rendering('\u{85}'), "\\x85");
    }

    #[test]
    fn plain_paint_round_trips_text() {
        let mut buf = LineBuffer::new();
        buf.insert_str("hello");
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 0, 0).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.contains("hello"));
    }

    #[test]
    fn styled_region_emits_sgr() {
        let mut buf = LineBuffer::new();
        buf.insert_str("abc");
        let style = Style {
            bold: true,
            ..Style::default()
        };
        buf.stylize(Span::new(1, 2), &style);
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 0, 0).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.contains("\x1b[1m"), "missing bold SGR: {s:?}");
        assert!(s.contains("\x1b[0m"), "missing reset: {s:?}");
    }

    #[test]
    fn hyperlink_opens_and_closes() {
        let mut buf = LineBuffer::new();
        buf.insert_str("link");
        let style = Style {
            hyperlink: Some("http://example.test".into()),
            ..Style::default()
        };
        buf.stylize(Span::new(0, 4), &style);
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 0, 0).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.contains("\x1b]8;;http://example.test\x1b\\"));
        assert!(s.contains("\x1b]8;;\x1b\\"));
    }

    #[test]
    fn per_char_mask_hides_content() {
        let mut buf = LineBuffer::new();
        buf.insert_str("secret");
        buf.set_mask(Span::new(0, 6), Mask::per_char("*"));
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 0, 0).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert!(!s.contains("secret"));
        assert!(s.contains("******"));
    }

    #[test]
    fn placeholder_mask_prints_once() {
        let mut buf = LineBuffer::new();
        buf.insert_str("abcdef");
        buf.set_mask(Span::new(1, 5), Mask::placeholder("…"));
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 0, 0).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert_eq!(s.matches('…').count(), 1);
        assert!(s.contains('a') && s.contains('f'));
        assert!(!s.contains('c'));
    }

    #[test]
    fn newline_paints_as_crlf() {
        let mut buf = LineBuffer::new();
        buf.insert_str("a\nb");
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 0, 0).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.contains("a\r\nb"));
    }

    #[test]
    fn paint_from_offset_skips_prefix() {
        let mut buf = LineBuffer::new();
        buf.insert_str("abcdef");
        let mut out = Vec::new();
        paint_buffer(&mut out, &buf, 4, 4).expect("paint");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.contains("ef"));
        assert!(!s.contains("abcd"));
    }
}
