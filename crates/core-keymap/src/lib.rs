//! core-keymap: key-chord to editor-function mapping.
//!
//! Design principles:
//! - Pure and deterministic: resolution depends only on the binding table and
//!   the pending key sequence.
//! - Ambiguity is surfaced: a strict prefix of one or more bindings resolves
//!   to `Pending` until a terminal mapping is confirmed or the prefix dies.
//! - No side effects: logging only at TRACE for resolution steps.
//!
//! Chord normalization folds `Ctrl+<letter>` onto the raw control byte the
//! terminal would deliver, so termios special characters (`VEOF`, `VWERASE`,
//! `VKILL`) and their Ctrl-chord spellings land on the same binding.

use core_events::{KeyCode, KeyEvent, KeyModifiers};
use smallvec::SmallVec;
use tracing::trace;

/// Editor operations a key sequence can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFunction {
    MoveHome,
    MoveEnd,
    MoveLeft,
    MoveRight,
    MoveWordLeft,
    MoveWordRight,
    /// Recall the previous (older) history entry.
    SearchBackwards,
    /// Recall the next (newer) history entry.
    SearchForwards,
    DeleteBack,
    DeleteForward,
    /// Ctrl-D: delete forward on a non-empty buffer, end-of-file on an
    /// empty one (the VEOF conflation).
    DeleteOrEof,
    KillToEnd,
    KillToStart,
    KillWordBack,
    KillWordForward,
    ClearScreen,
    Complete,
    ReverseComplete,
    AcceptLine,
    Interrupt,
    VerbatimInsert,
}

/// What a completed binding does: invoke an internal function or insert a
/// literal payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingAction {
    Invoke(InternalFunction),
    Insert(String),
}

/// One binding: a key sequence (usually one chord, occasionally more) and
/// its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub keys: SmallVec<[KeyEvent; 2]>,
    pub action: BindingAction,
}

impl KeyBinding {
    pub fn single(key: KeyEvent, action: BindingAction) -> Self {
        Self {
            keys: SmallVec::from_slice(&[key]),
            action,
        }
    }
}

/// Result of feeding a pending key sequence against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// A terminal mapping matched exactly.
    Match(&'a BindingAction),
    /// The sequence is a strict prefix of at least one binding.
    Pending,
    /// Nothing matches; the pending keys should replay as literals.
    NoMatch,
}

/// Fold a `Ctrl+<char>` chord onto the raw control byte the terminal
/// delivers for it (`Ctrl+D` → `0x04`). Non-ASCII and already-control codes
/// pass through unchanged.
pub fn normalize(key: KeyEvent) -> KeyEvent {
    if !key.mods.contains(KeyModifiers::CTRL) {
        return key;
    }
    let KeyCode::Char(c) = key.code else {
        return key;
    };
    let upper = c.to_ascii_uppercase();
    if !(('@'..='_').contains(&upper) || c == '?') {
        return key;
    }
    let folded = if c == '?' {
        '\u{7f}'
    } else {
        char::from(upper as u8 & 0x1f)
    };
    KeyEvent::new(KeyCode::Char(folded), key.mods - KeyModifiers::CTRL)
}

#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: Vec<KeyBinding>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a binding, replacing any existing one with the same key
    /// sequence. Keys are normalized on the way in.
    pub fn bind(&mut self, keys: impl IntoIterator<Item = KeyEvent>, action: BindingAction) {
        let keys: SmallVec<[KeyEvent; 2]> = keys.into_iter().map(normalize).collect();
        if keys.is_empty() {
            return;
        }
        self.bindings.retain(|b| b.keys != keys);
        self.bindings.push(KeyBinding { keys, action });
    }

    pub fn bind_key(&mut self, key: KeyEvent, action: BindingAction) {
        self.bind([key], action);
    }

    /// Resolve a pending sequence. Exact matches win over longer bindings
    /// sharing the prefix only once the sequence can no longer extend: an
    /// exact match that is also a strict prefix of another binding resolves
    /// `Match` immediately (first-match-wins keeps dispatch latency at one
    /// event, which is what a line editor wants).
    pub fn resolve(&self, pending: &[KeyEvent]) -> Resolution<'_> {
        if pending.is_empty() {
            return Resolution::NoMatch;
        }
        if let Some(binding) = self.bindings.iter().find(|b| b.keys.as_slice() == pending) {
            trace!(target: "input.keymap", keys = pending.len(), "match");
            return Resolution::Match(&binding.action);
        }
        if self
            .bindings
            .iter()
            .any(|b| b.keys.len() > pending.len() && b.keys.starts_with(pending))
        {
            trace!(target: "input.keymap", keys = pending.len(), "pending");
            return Resolution::Pending;
        }
        trace!(target: "input.keymap", keys = pending.len(), "no_match");
        Resolution::NoMatch
    }

    /// Whether any binding invokes `func` (used to arm decoder states that
    /// only exist when the binding system accepts them).
    pub fn invokes(&self, func: InternalFunction) -> bool {
        self.bindings
            .iter()
            .any(|b| b.action == BindingAction::Invoke(func))
    }

    /// The default emacs-style table.
    pub fn emacs_defaults() -> Self {
        use BindingAction::Invoke;
        use InternalFunction::*;
        let mut map = Self::new();
        let ctrl = |c: char| KeyEvent::plain(char::from(c.to_ascii_uppercase() as u8 & 0x1f));
        map.bind_key(ctrl('a'), Invoke(MoveHome));
        map.bind_key(ctrl('e'), Invoke(MoveEnd));
        map.bind_key(ctrl('b'), Invoke(MoveLeft));
        map.bind_key(ctrl('f'), Invoke(MoveRight));
        map.bind_key(ctrl('d'), Invoke(DeleteOrEof));
        map.bind_key(ctrl('k'), Invoke(KillToEnd));
        map.bind_key(ctrl('u'), Invoke(KillToStart));
        map.bind_key(ctrl('w'), Invoke(KillWordBack));
        map.bind_key(ctrl('l'), Invoke(ClearScreen));
        map.bind_key(ctrl('c'), Invoke(Interrupt));
        map.bind_key(ctrl('v'), Invoke(VerbatimInsert));
        map.bind_key(ctrl('h'), Invoke(DeleteBack));
        map.bind_key(KeyEvent::plain('\u{7f}'), Invoke(DeleteBack));
        map.bind_key(KeyEvent::plain('\t'), Invoke(Complete));
        map.bind_key(KeyEvent::plain('\r'), Invoke(AcceptLine));
        map.bind_key(KeyEvent::plain('\n'), Invoke(AcceptLine));
        map.bind_key(KeyEvent::plain_code(KeyCode::BackTab), Invoke(ReverseComplete));
        map.bind_key(KeyEvent::plain_code(KeyCode::Up), Invoke(SearchBackwards));
        map.bind_key(KeyEvent::plain_code(KeyCode::Down), Invoke(SearchForwards));
        map.bind_key(KeyEvent::plain_code(KeyCode::Left), Invoke(MoveLeft));
        map.bind_key(KeyEvent::plain_code(KeyCode::Right), Invoke(MoveRight));
        map.bind_key(KeyEvent::plain_code(KeyCode::Home), Invoke(MoveHome));
        map.bind_key(KeyEvent::plain_code(KeyCode::End), Invoke(MoveEnd));
        map.bind_key(KeyEvent::plain_code(KeyCode::Delete), Invoke(DeleteForward));
        map.bind_key(KeyEvent::alt('b'), Invoke(MoveWordLeft));
        map.bind_key(KeyEvent::alt('f'), Invoke(MoveWordRight));
        map.bind_key(KeyEvent::alt('d'), Invoke(KillWordForward));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ctrl_chord_folds_to_control_byte() {
        let chord = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CTRL);
        assert_eq!(normalize(chord), KeyEvent::plain('\x04'));
        // Uppercase spelling folds identically.
        let chord = KeyEvent::new(KeyCode::Char('D'), KeyModifiers::CTRL);
        assert_eq!(normalize(chord), KeyEvent::plain('\x04'));
    }

    #[test]
    fn termios_special_chars_share_bindings_with_ctrl_chords() {
        // VEOF / VWERASE / VKILL arrive as raw bytes; the Ctrl-chord spelling
        // must land on the same binding.
        let map = Keymap::emacs_defaults();
        for (ch, func) in [
            ('d', InternalFunction::DeleteOrEof),
            ('w', InternalFunction::KillWordBack),
            ('u', InternalFunction::KillToStart),
        ] {
            let raw = KeyEvent::plain(char::from(ch.to_ascii_uppercase() as u8 & 0x1f));
            let chord = normalize(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CTRL));
            assert_eq!(raw, chord);
            match map.resolve(&[raw]) {
                Resolution::Match(BindingAction::Invoke(f)) => assert_eq!(*f, func),
                other => panic!("expected invoke for {ch}: {other:?}"),
            }
        }
    }

    #[test]
    fn ctrl_question_mark_folds_to_del() {
        let chord = KeyEvent::new(KeyCode::Char('?'), KeyModifiers::CTRL);
        assert_eq!(normalize(chord), KeyEvent::plain('\u{7f}'));
    }

    #[test]
    fn non_foldable_chords_pass_through() {
        let chord = KeyEvent::new(KeyCode::Up, KeyModifiers::CTRL);
        assert_eq!(normalize(chord), chord);
    }

    #[test]
    fn multi_key_sequence_resolution() {
        let mut map = Keymap::new();
        map.bind(
            [KeyEvent::alt('g'), KeyEvent::plain('x')],
            BindingAction::Insert("expanded".into()),
        );
        assert_eq!(map.resolve(&[KeyEvent::alt('g')]), Resolution::Pending);
        match map.resolve(&[KeyEvent::alt('g'), KeyEvent::plain('x')]) {
            Resolution::Match(BindingAction::Insert(s)) => assert_eq!(s, "expanded"),
            other => panic!("expected insert match: {other:?}"),
        }
        assert_eq!(
            map.resolve(&[KeyEvent::alt('g'), KeyEvent::plain('y')]),
            Resolution::NoMatch
        );
    }

    #[test]
    fn rebinding_replaces() {
        let mut map = Keymap::new();
        map.bind_key(
            KeyEvent::plain('\x07'),
            BindingAction::Invoke(InternalFunction::MoveHome),
        );
        map.bind_key(
            KeyEvent::plain('\x07'),
            BindingAction::Invoke(InternalFunction::MoveEnd),
        );
        match map.resolve(&[KeyEvent::plain('\x07')]) {
            Resolution::Match(BindingAction::Invoke(f)) => {
                assert_eq!(*f, InternalFunction::MoveEnd)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn defaults_arm_verbatim() {
        let map = Keymap::emacs_defaults();
        assert!(map.invokes(InternalFunction::VerbatimInsert));
    }
}
