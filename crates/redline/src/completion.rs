//! Tab-completion session state: the manager side of the
//! `on_tab_complete` protocol.
//!
//! The suggestion source is external; this module owns inserting a
//! suggestion over the completed token, highlighting it with an anchored
//! span (so other edits cannot detach the highlight from the text), and
//! cycling through candidates on repeated Tab / reverse-Tab.

use core_render::RenderEngine;
use core_text::{LineBuffer, Span, Style};
use tracing::trace;

/// One candidate produced by the completion source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSuggestion {
    pub text: String,
}

impl CompletionSuggestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

fn highlight() -> Style {
    Style {
        underline: true,
        ..Style::default()
    }
}

#[derive(Debug, Default)]
pub(crate) struct CompletionState {
    suggestions: Vec<CompletionSuggestion>,
    index: usize,
    /// Region currently holding the inserted suggestion.
    region: Option<Span>,
}

impl CompletionState {
    pub fn is_active(&self) -> bool {
        self.region.is_some()
    }

    pub fn reset(&mut self) {
        self.suggestions.clear();
        self.index = 0;
        self.region = None;
    }

    /// Start a session: replace `[word_start, cursor)` with the first
    /// suggestion. No-op on an empty candidate list.
    pub fn begin(
        &mut self,
        buffer: &mut LineBuffer,
        engine: &mut RenderEngine,
        word_start: usize,
        suggestions: Vec<CompletionSuggestion>,
    ) {
        if suggestions.is_empty() {
            return;
        }
        trace!(target: "editor.complete", candidates = suggestions.len(), "begin");
        self.suggestions = suggestions;
        self.index = 0;
        self.region = Some(Span::new(word_start, buffer.cursor()));
        self.apply_current(buffer, engine);
    }

    /// Advance (or rewind) the cycle and swap the suggestion in place.
    pub fn cycle(&mut self, buffer: &mut LineBuffer, engine: &mut RenderEngine, forward: bool) {
        if self.suggestions.is_empty() || self.region.is_none() {
            return;
        }
        let n = self.suggestions.len();
        self.index = if forward {
            (self.index + 1) % n
        } else {
            (self.index + n - 1) % n
        };
        trace!(target: "editor.complete", index = self.index, "cycle");
        self.apply_current(buffer, engine);
    }

    /// Keep the inserted text but drop the highlight and end the session.
    pub fn accept(&mut self, buffer: &mut LineBuffer) {
        if let Some(region) = self.region.take() {
            trace!(target: "editor.complete", "accept");
            // The highlight may have been relocated by edits; locate it by
            // the tracked region.
            buffer.styles_mut().anchored.unstyle(region);
        }
        self.suggestions.clear();
        self.index = 0;
    }

    fn apply_current(&mut self, buffer: &mut LineBuffer, engine: &mut RenderEngine) {
        let Some(region) = self.region else {
            return;
        };
        let Some(suggestion) = self.suggestions.get(self.index).cloned() else {
            return;
        };
        // Remove the old region (edits relocate/drop the old highlight).
        for _ in region.start..region.end {
            engine.note_edit(region.start);
            if buffer.remove_at(region.start).is_none() {
                break;
            }
        }
        buffer.set_cursor(region.start);
        for ch in suggestion.text.chars() {
            engine.note_edit(buffer.cursor());
            buffer.insert(ch);
        }
        let new_region = Span::new(region.start, region.start + suggestion.text.chars().count());
        buffer.stylize_anchored(new_region, &highlight());
        self.region = Some(new_region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(text: &str) -> (LineBuffer, RenderEngine) {
        let mut buf = LineBuffer::new();
        buf.insert_str(text);
        (buf, RenderEngine::new(80, 24))
    }

    #[test]
    fn begin_replaces_token_and_highlights() {
        let (mut buf, mut eng) = setup("git ch");
        let mut state = CompletionState::default();
        state.begin(
            &mut buf,
            &mut eng,
            4,
            vec![
                CompletionSuggestion::new("checkout"),
                CompletionSuggestion::new("cherry-pick"),
            ],
        );
        assert_eq!(buf.text(), "git checkout");
        assert_eq!(buf.cursor(), 12);
        assert!(state.is_active());
        let spans: Vec<_> = buf.styles().anchored.iter().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].0, Span::new(4, 12));
    }

    #[test]
    fn cycle_swaps_in_place_and_wraps() {
        let (mut buf, mut eng) = setup("git ch");
        let mut state = CompletionState::default();
        state.begin(
            &mut buf,
            &mut eng,
            4,
            vec![
                CompletionSuggestion::new("checkout"),
                CompletionSuggestion::new("cherry-pick"),
            ],
        );
        state.cycle(&mut buf, &mut eng, true);
        assert_eq!(buf.text(), "git cherry-pick");
        state.cycle(&mut buf, &mut eng, true);
        assert_eq!(buf.text(), "git checkout"); // wrapped around
        state.cycle(&mut buf, &mut eng, false);
        assert_eq!(buf.text(), "git cherry-pick"); // reverse wraps too
    }

    #[test]
    fn accept_keeps_text_drops_highlight() {
        let (mut buf, mut eng) = setup("git ch");
        let mut state = CompletionState::default();
        state.begin(
            &mut buf,
            &mut eng,
            4,
            vec![CompletionSuggestion::new("checkout")],
        );
        state.accept(&mut buf);
        assert_eq!(buf.text(), "git checkout");
        assert!(!state.is_active());
        assert!(buf.styles().anchored.is_empty());
    }

    #[test]
    fn empty_candidates_do_nothing() {
        let (mut buf, mut eng) = setup("ls ");
        let mut state = CompletionState::default();
        state.begin(&mut buf, &mut eng, 3, Vec::new());
        assert_eq!(buf.text(), "ls ");
        assert!(!state.is_active());
    }
}
