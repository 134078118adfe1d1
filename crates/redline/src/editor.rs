use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Read, Write};

use tracing::{debug, info, trace};

use core_events::{InputEvent, KeyCode, KeyEvent};
use core_history::History;
use core_input::Decoder;
use core_keymap::{BindingAction, InternalFunction, Keymap, Resolution, normalize};
use core_render::RenderEngine;
use core_terminal::{CrosstermBackend, queue_cursor_position_query, terminal_size};
use core_text::{LineBuffer, Mask, Span, Style};

use crate::completion::{CompletionState, CompletionSuggestion};
use crate::{Error, LineContext};

/// How an edit session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    /// The user accepted the line (Enter).
    Line(String),
    /// Ctrl-D on an empty buffer.
    Eof,
    /// The interrupt path ran (Ctrl-C).
    Interrupted,
    /// `finish()` was called; the session returns the buffer as-is.
    Finished(String),
}

/// Mutable view handed to custom key handlers.
pub struct EditorCtx<'a> {
    pub buffer: &'a mut LineBuffer,
    pub history: &'a mut History,
    finish: &'a mut bool,
}

impl EditorCtx<'_> {
    /// Ask the editor to end the session at the next safe point.
    pub fn finish(&mut self) {
        *self.finish = true;
    }
}

type CompletionFn = Box<dyn FnMut(&LineContext) -> Vec<CompletionSuggestion>>;
type PasteFn = Box<dyn FnMut(&str) -> bool>;
type RefreshFn = Box<dyn FnMut(&LineContext)>;
type KeyHandler = Box<dyn FnMut(&mut EditorCtx<'_>) -> bool>;

#[derive(Default)]
struct Callbacks {
    on_tab_complete: Option<CompletionFn>,
    on_paste: Option<PasteFn>,
    on_display_refresh: Option<RefreshFn>,
}

/// Deferred work drained once per tick at a safe point between complete
/// logical events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    /// Issue a DSR cursor-position query (resize invalidated the origin).
    OriginQuery,
}

/// The line editor. Generic over the output sink so tests can drive it
/// against a byte buffer.
pub struct Editor<W: Write = io::Stdout> {
    out: W,
    prompt: String,
    buffer: LineBuffer,
    decoder: Decoder,
    keymap: Keymap,
    history: History,
    engine: RenderEngine,
    completion: CompletionState,
    callbacks: Callbacks,
    handlers: HashMap<KeyEvent, KeyHandler>,
    pending_keys: Vec<KeyEvent>,

    deferred: VecDeque<Deferred>,
    /// Re-entrancy guard: input arriving while a batch is being processed is
    /// buffered here and replayed afterwards.
    prohibit_input: bool,
    replay_buf: Vec<u8>,
    /// SIGWINCH observed; applied only between complete logical events.
    resize_pending: Option<(u16, u16)>,
    /// An interrupt signal was observed (the EINTR retry path consults it).
    interrupt_pending: bool,
    finish: bool,
    result: Option<SessionResult>,
}

impl Editor<io::Stdout> {
    pub fn new() -> Self {
        let (cols, rows) = terminal_size();
        Self::with_output(io::stdout(), cols, rows)
    }
}

impl Default for Editor<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Editor<W> {
    /// Build an editor over an arbitrary sink (dependency-injected terminal,
    /// as tests do).
    pub fn with_output(out: W, cols: u16, rows: u16) -> Self {
        let keymap = Keymap::emacs_defaults();
        let mut decoder = Decoder::new();
        decoder.set_verbatim_enabled(keymap.invokes(InternalFunction::VerbatimInsert));
        Self {
            out,
            prompt: String::new(),
            buffer: LineBuffer::new(),
            decoder,
            keymap,
            history: History::default(),
            engine: RenderEngine::new(cols, rows),
            completion: CompletionState::default(),
            callbacks: Callbacks::default(),
            handlers: HashMap::new(),
            pending_keys: Vec::new(),
            deferred: VecDeque::new(),
            prohibit_input: false,
            replay_buf: Vec::new(),
            resize_pending: None,
            interrupt_pending: false,
            finish: false,
            result: None,
        }
    }

    // ---------------------------------------------------------------------
    // Configuration & callbacks
    // ---------------------------------------------------------------------

    pub fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    pub fn set_history(&mut self, history: History) {
        self.history = history;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Install a key binding (sequence → function or literal insertion).
    pub fn bind(&mut self, keys: impl IntoIterator<Item = KeyEvent>, action: BindingAction) {
        self.keymap.bind(keys, action);
        self.decoder
            .set_verbatim_enabled(self.keymap.invokes(InternalFunction::VerbatimInsert));
    }

    /// Install a custom handler for a key chord; it runs before the keymap
    /// and consumes the key when it returns `true`.
    pub fn bind_handler(
        &mut self,
        key: KeyEvent,
        handler: impl FnMut(&mut EditorCtx<'_>) -> bool + 'static,
    ) {
        self.handlers.insert(normalize(key), Box::new(handler));
    }

    pub fn on_tab_complete(
        &mut self,
        f: impl FnMut(&LineContext) -> Vec<CompletionSuggestion> + 'static,
    ) {
        self.callbacks.on_tab_complete = Some(Box::new(f));
    }

    /// Paste interception; return `true` to consume the paste, `false` for
    /// the default insertion.
    pub fn on_paste(&mut self, f: impl FnMut(&str) -> bool + 'static) {
        self.callbacks.on_paste = Some(Box::new(f));
    }

    pub fn on_display_refresh(&mut self, f: impl FnMut(&LineContext) + 'static) {
        self.callbacks.on_display_refresh = Some(Box::new(f));
    }

    // ---------------------------------------------------------------------
    // Public mutation API
    // ---------------------------------------------------------------------

    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    /// Insert text at the cursor.
    pub fn insert(&mut self, text: &str) -> Result<(), Error> {
        for ch in text.chars() {
            self.insert_char(ch);
        }
        self.refresh()
    }

    /// Merge a style over a literal-offset span.
    pub fn stylize(&mut self, span: Span, style: &Style) -> Result<(), Error> {
        self.buffer.stylize(span, style);
        self.refresh()
    }

    /// Merge a style over an anchored span that tracks its text across
    /// edits.
    pub fn stylize_anchored(&mut self, span: Span, style: &Style) -> Result<(), Error> {
        self.buffer.stylize_anchored(span, style);
        self.refresh()
    }

    pub fn set_mask(&mut self, span: Span, mask: Mask) -> Result<(), Error> {
        self.buffer.set_mask(span, mask);
        self.engine.invalidate();
        self.refresh()
    }

    pub fn add_to_history(&mut self, line: &str) -> bool {
        self.history.add(line)
    }

    pub fn load_history(&mut self, path: &std::path::Path) -> bool {
        self.history.load(path)
    }

    pub fn save_history(&mut self, path: &std::path::Path) -> bool {
        self.history.save(path)
    }

    /// End the session at the next safe point, returning the buffer as-is.
    pub fn finish(&mut self) {
        self.finish = true;
    }

    /// Signal delivery hooks for the embedding event loop.
    pub fn notify_resize(&mut self, cols: u16, rows: u16) {
        self.resize_pending = Some((cols, rows));
    }

    pub fn notify_interrupt(&mut self) {
        self.interrupt_pending = true;
    }

    // ---------------------------------------------------------------------
    // Event-loop driven entry points
    // ---------------------------------------------------------------------

    /// Process one chunk of raw input bytes. Re-entrant calls (from within a
    /// callback) are buffered and replayed after the in-flight batch.
    pub fn handle_input(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.prohibit_input {
            self.replay_buf.extend_from_slice(bytes);
            return Ok(());
        }
        self.prohibit_input = true;
        let result = self.process_bytes(bytes);
        self.prohibit_input = false;
        if result.is_err() {
            return result;
        }
        while !self.replay_buf.is_empty() && self.result.is_none() {
            let buffered = std::mem::take(&mut self.replay_buf);
            self.prohibit_input = true;
            let replay_result = self.process_bytes(&buffered);
            self.prohibit_input = false;
            replay_result?;
        }
        Ok(())
    }

    /// The session outcome, if one is ready. Consumed by `get_line`;
    /// external event loops poll it after `handle_input`.
    pub fn take_result(&mut self) -> Option<SessionResult> {
        self.result.take()
    }

    /// Prepare a fresh session: empty buffer, cleared spans, prompt drawn by
    /// the first refresh.
    pub fn begin_session(&mut self, prompt: &str) -> Result<(), Error> {
        self.prompt = prompt.to_string();
        self.buffer.reset();
        self.completion.reset();
        self.pending_keys.clear();
        self.history.reset_navigation();
        self.finish = false;
        self.result = None;
        self.refresh()
    }

    fn process_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let events = self.decoder.feed(bytes);
        for event in events {
            self.dispatch(event)?;
            if self.finish && self.result.is_none() {
                self.result = Some(SessionResult::Finished(self.buffer.text()));
            }
            if self.result.is_some() {
                break;
            }
            // Safe point between complete logical events: a resize observed
            // mid-sequence waits until the decoder is out of its escape.
            if !self.decoder.mid_sequence() {
                self.apply_pending_resize();
            }
        }
        if !self.decoder.mid_sequence() {
            self.apply_pending_resize();
        }
        self.drain_deferred()?;
        self.refresh()
    }

    fn dispatch(&mut self, event: InputEvent) -> Result<(), Error> {
        match event {
            InputEvent::CursorReport { row, col } => {
                self.engine.apply_cursor_report(row, col);
                Ok(())
            }
            InputEvent::Verbatim(c) => {
                self.end_completion();
                self.insert_char(c);
                Ok(())
            }
            InputEvent::Paste(text) => self.dispatch_paste(text),
            InputEvent::Key(key) => self.dispatch_key(normalize(key)),
        }
    }

    fn dispatch_paste(&mut self, text: String) -> Result<(), Error> {
        self.end_completion();
        if let Some(cb) = &mut self.callbacks.on_paste
            && cb(&text)
        {
            debug!(target: "editor.paste", len = text.len(), "consumed_by_callback");
            return Ok(());
        }
        // Default: insert atomically, normalizing composition and line
        // endings.
        let text = core_text::normalize_for_insert(&text).into_owned();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    self.insert_char('\n');
                }
                _ => self.insert_char(c),
            }
        }
        debug!(target: "editor.paste", len = text.len(), "inserted");
        Ok(())
    }

    fn dispatch_key(&mut self, key: KeyEvent) -> Result<(), Error> {
        // Custom handlers run first, on bare chords only.
        if self.pending_keys.is_empty()
            && let Some(mut handler) = self.handlers.remove(&key)
        {
            let mut ctx = EditorCtx {
                buffer: &mut self.buffer,
                history: &mut self.history,
                finish: &mut self.finish,
            };
            let handled = handler(&mut ctx);
            self.handlers.insert(key, handler);
            if handled {
                self.engine.invalidate();
                return Ok(());
            }
        }

        self.pending_keys.push(key);
        match self.keymap.resolve(&self.pending_keys) {
            Resolution::Match(action) => {
                let action = action.clone();
                self.pending_keys.clear();
                self.run_action(action)
            }
            Resolution::Pending => Ok(()),
            Resolution::NoMatch => {
                let keys = std::mem::take(&mut self.pending_keys);
                for k in keys {
                    if let KeyCode::Char(c) = k.code
                        && k.mods.is_empty()
                        && !c.is_control()
                    {
                        self.end_completion();
                        self.insert_char(c);
                    }
                    // Unbound modified keys, named keys, and control bytes
                    // are ignored.
                }
                Ok(())
            }
        }
    }

    fn run_action(&mut self, action: BindingAction) -> Result<(), Error> {
        use InternalFunction::*;
        let func = match action {
            BindingAction::Insert(text) => {
                self.end_completion();
                for ch in text.chars() {
                    self.insert_char(ch);
                }
                return Ok(());
            }
            BindingAction::Invoke(func) => func,
        };
        // Completion keeps cycling on its own keys; anything else accepts
        // the inserted suggestion first.
        if !matches!(func, Complete | ReverseComplete) {
            self.end_completion();
        }
        match func {
            MoveHome => self.buffer.move_home(),
            MoveEnd => self.buffer.move_end(),
            MoveLeft => {
                self.buffer.move_left();
            }
            MoveRight => {
                self.buffer.move_right();
            }
            MoveWordLeft => self.buffer.move_word_left(),
            MoveWordRight => self.buffer.move_word_right(),
            SearchBackwards => self.recall_backwards(),
            SearchForwards => self.recall_forwards(),
            DeleteBack => {
                if self.buffer.cursor() > 0 {
                    self.engine.note_edit(self.buffer.cursor() - 1);
                    self.buffer.backspace();
                    self.history.reset_navigation();
                }
            }
            DeleteForward => self.delete_forward(),
            DeleteOrEof => {
                if self.buffer.is_empty() {
                    info!(target: "editor.session", "eof");
                    self.result = Some(SessionResult::Eof);
                } else {
                    self.delete_forward();
                }
            }
            KillToEnd => {
                self.engine.note_edit(self.buffer.cursor());
                self.buffer.kill_to_end();
                self.history.reset_navigation();
            }
            KillToStart => {
                self.engine.note_edit(0);
                self.buffer.kill_to_start();
                self.history.reset_navigation();
            }
            KillWordBack => {
                self.engine.note_edit(self.buffer.prev_word_start());
                self.buffer.kill_word_back();
                self.history.reset_navigation();
            }
            KillWordForward => {
                self.engine.note_edit(self.buffer.cursor());
                self.buffer.kill_word_forward();
                self.history.reset_navigation();
            }
            ClearScreen => {
                self.engine.clear_screen(&mut self.out).map_err(Error::ReadFailure)?;
            }
            Complete => self.complete(true)?,
            ReverseComplete => self.complete(false)?,
            AcceptLine => {
                let line = self.buffer.text();
                info!(target: "editor.session", chars = line.chars().count(), "accept");
                self.result = Some(SessionResult::Line(line));
            }
            Interrupt => {
                info!(target: "editor.session", "interrupt");
                self.result = Some(SessionResult::Interrupted);
            }
            VerbatimInsert => {
                // Reached only when a key other than Ctrl-V is bound to
                // verbatim insertion (the decoder intercepts 0x16 itself).
                self.decoder.arm_verbatim();
            }
        }
        Ok(())
    }

    fn delete_forward(&mut self) {
        if self.buffer.cursor() < self.buffer.len() {
            self.engine.note_edit(self.buffer.cursor());
            self.buffer.delete_forward();
            self.history.reset_navigation();
        }
    }

    fn insert_char(&mut self, c: char) {
        self.engine.note_edit(self.buffer.cursor());
        self.buffer.insert(c);
        self.history.reset_navigation();
    }

    fn recall_backwards(&mut self) {
        let current = self.buffer.text();
        if let Some(text) = self.history.search_backwards(&current).map(str::to_string) {
            self.buffer.replace_all(&text);
            self.engine.invalidate();
        }
    }

    fn recall_forwards(&mut self) {
        if let Some(text) = self.history.search_forwards() {
            self.buffer.replace_all(&text);
            self.engine.invalidate();
        }
    }

    fn complete(&mut self, forward: bool) -> Result<(), Error> {
        if self.completion.is_active() {
            self.completion
                .cycle(&mut self.buffer, &mut self.engine, forward);
            return Ok(());
        }
        let Some(cb) = &mut self.callbacks.on_tab_complete else {
            return Ok(());
        };
        let word_start = self.buffer.prev_word_start();
        let ctx = LineContext {
            text: self.buffer.text(),
            cursor: self.buffer.cursor(),
            word_start,
            word: self
                .buffer
                .text_range(Span::new(word_start, self.buffer.cursor())),
        };
        let suggestions = cb(&ctx);
        self.completion
            .begin(&mut self.buffer, &mut self.engine, word_start, suggestions);
        Ok(())
    }

    fn end_completion(&mut self) {
        if self.completion.is_active() {
            self.completion.accept(&mut self.buffer);
        }
    }

    fn apply_pending_resize(&mut self) {
        if let Some((cols, rows)) = self.resize_pending.take() {
            debug!(target: "editor.session", cols, rows, "resize");
            self.engine.resize(cols, rows);
            if self.engine.wants_origin_query()
                && !self.deferred.contains(&Deferred::OriginQuery)
            {
                self.deferred.push_back(Deferred::OriginQuery);
            }
        }
    }

    /// Drain the deferred-work queue (one tick's worth).
    fn drain_deferred(&mut self) -> Result<(), Error> {
        while let Some(work) = self.deferred.pop_front() {
            match work {
                Deferred::OriginQuery => {
                    trace!(target: "editor.session", "origin_query");
                    queue_cursor_position_query(&mut self.out).map_err(Error::ReadFailure)?;
                    self.out.flush().map_err(Error::ReadFailure)?;
                }
            }
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), Error> {
        self.engine
            .refresh(&mut self.out, &self.prompt, &self.buffer)
            .map_err(Error::ReadFailure)?;
        if let Some(cb) = &mut self.callbacks.on_display_refresh {
            let word_start = self.buffer.prev_word_start();
            cb(&LineContext {
                text: self.buffer.text(),
                cursor: self.buffer.cursor(),
                word_start,
                word: self
                    .buffer
                    .text_range(Span::new(word_start, self.buffer.cursor())),
            });
        }
        Ok(())
    }

    /// Close out the session visually and hand back the outcome.
    fn finalize(&mut self, result: SessionResult) -> Result<String, Error> {
        self.engine
            .finalize_line(&mut self.out)
            .map_err(Error::ReadFailure)?;
        self.buffer.reset();
        match result {
            SessionResult::Line(line) => Ok(line),
            SessionResult::Finished(line) => Ok(line),
            SessionResult::Eof => Err(Error::Eof),
            SessionResult::Interrupted => Err(Error::Interrupted),
        }
    }
}

impl Editor<io::Stdout> {
    /// Read one line interactively. Enters raw mode for the duration (the
    /// guard restores the terminal on every exit path), falls back to plain
    /// buffered reading when the descriptor is not a terminal.
    pub fn get_line(&mut self, prompt: &str) -> Result<String, Error> {
        let mut backend = CrosstermBackend::new();
        let guard = match backend.enter_guard() {
            Ok(guard) => guard,
            Err(err) => {
                debug!(target: "editor.session", error = %err, "raw_mode_unavailable");
                return self.get_line_fallback(prompt);
            }
        };

        self.begin_session(prompt)?;
        let mut stdin = io::stdin().lock();
        let mut chunk = [0u8; 1024];
        let outcome = loop {
            match stdin.read(&mut chunk) {
                Ok(0) => {
                    // Descriptor drained: still leave the screen tidy.
                    let _ = self.engine.finalize_line(&mut self.out);
                    break Err(Error::Empty);
                }
                Ok(n) => {
                    self.handle_input(&chunk[..n])?;
                    if let Some(result) = self.take_result() {
                        break self.finalize(result);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    // EINTR: retry, unless it corresponds to an observed
                    // interrupt signal, in which case the interrupt path runs.
                    if self.interrupt_pending {
                        self.interrupt_pending = false;
                        break self.finalize(SessionResult::Interrupted);
                    }
                    self.apply_pending_resize();
                    self.drain_deferred()?;
                    self.refresh()?;
                }
                Err(err) => break Err(Error::ReadFailure(err)),
            }
        };
        drop(guard);
        outcome
    }

    /// Non-interactive path: plain line reads, `Eof` at end of input so
    /// callers can tell a pipe draining from Ctrl-D.
    fn get_line_fallback(&mut self, prompt: &str) -> Result<String, Error> {
        write!(self.out, "{prompt}").map_err(Error::ReadFailure)?;
        self.out.flush().map_err(Error::ReadFailure)?;
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Err(Error::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::KeyModifiers;

    fn editor() -> Editor<Vec<u8>> {
        Editor::with_output(Vec::new(), 80, 24)
    }

    fn start(ed: &mut Editor<Vec<u8>>) {
        ed.begin_session("> ").expect("session start");
    }

    #[test]
    fn typing_and_accept() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"hello\r").expect("input");
        assert_eq!(ed.take_result(), Some(SessionResult::Line("hello".into())));
    }

    #[test]
    fn ctrl_d_empty_is_eof_nonempty_deletes() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"ab\x01").expect("input"); // Ctrl-A home
        ed.handle_input(b"\x04").expect("input"); // Ctrl-D deletes 'a'
        assert_eq!(ed.buffer().text(), "b");
        assert!(ed.take_result().is_none());

        ed.handle_input(b"\x04\x04").expect("input"); // delete 'b', then EOF
        assert_eq!(ed.take_result(), Some(SessionResult::Eof));
    }

    #[test]
    fn interrupt_via_ctrl_c() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"half a line\x03").expect("input");
        assert_eq!(ed.take_result(), Some(SessionResult::Interrupted));
    }

    #[test]
    fn word_kills_and_moves() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"one two three").expect("input");
        ed.handle_input(b"\x17").expect("input"); // Ctrl-W
        assert_eq!(ed.buffer().text(), "one two ");
        ed.handle_input(b"\x1bb").expect("input"); // Alt-B
        assert_eq!(ed.buffer().cursor(), 4);
        ed.handle_input(b"\x15").expect("input"); // Ctrl-U kills to start
        assert_eq!(ed.buffer().text(), "two ");
    }

    #[test]
    fn arrow_recall_in_three_reads_invokes_search_once() {
        let mut ed = editor();
        ed.history_mut().add("previous command");
        start(&mut ed);
        ed.handle_input(b"\x1b").expect("input");
        ed.handle_input(b"[").expect("input");
        ed.handle_input(b"A").expect("input");
        // Exactly one recall: the buffer holds the newest entry (a second
        // recall would have walked past it or stayed; assert content and
        // that a following Down restores the empty draft).
        assert_eq!(ed.buffer().text(), "previous command");
        ed.handle_input(b"\x1b[B").expect("input");
        assert_eq!(ed.buffer().text(), "");
    }

    #[test]
    fn history_recall_is_prefix_filtered() {
        let mut ed = editor();
        ed.history_mut().add("make test");
        ed.history_mut().add("ls -la");
        start(&mut ed);
        ed.handle_input(b"make").expect("input");
        ed.handle_input(b"\x1b[A").expect("input");
        assert_eq!(ed.buffer().text(), "make test");
    }

    #[test]
    fn completion_cycles_through_suggestions() {
        let mut ed = editor();
        ed.on_tab_complete(|ctx| {
            assert_eq!(ctx.word, "ch");
            vec![
                CompletionSuggestion::new("checkout"),
                CompletionSuggestion::new("cherry-pick"),
            ]
        });
        start(&mut ed);
        ed.handle_input(b"git ch").expect("input");
        ed.handle_input(b"\t").expect("input");
        assert_eq!(ed.buffer().text(), "git checkout");
        ed.handle_input(b"\t").expect("input");
        assert_eq!(ed.buffer().text(), "git cherry-pick");
        ed.handle_input(b"\x1b[Z").expect("input"); // reverse tab
        assert_eq!(ed.buffer().text(), "git checkout");
        // Typing accepts the suggestion and keeps editing.
        ed.handle_input(b" -b").expect("input");
        assert_eq!(ed.buffer().text(), "git checkout -b");
        assert!(ed.buffer().styles().anchored.is_empty());
    }

    #[test]
    fn paste_is_atomic_and_bypasses_bindings() {
        let mut ed = editor();
        start(&mut ed);
        // The paste payload contains an arrow sequence and a CR.
        ed.handle_input(b"\x1b[200~line1\r\nline2\x1b[A\x1b[201~")
            .expect("input");
        assert_eq!(ed.buffer().text(), "line1\nline2\u{1b}[A");
        assert!(ed.take_result().is_none());
    }

    #[test]
    fn paste_callback_can_consume() {
        use std::cell::RefCell;
        use std::rc::Rc;
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let seen_by_cb = seen.clone();
        let mut ed = editor();
        ed.on_paste(move |text| {
            seen_by_cb.borrow_mut().push(text.to_string());
            true
        });
        start(&mut ed);
        ed.handle_input(b"\x1b[200~ignored\x1b[201~").expect("input");
        assert_eq!(ed.buffer().text(), "");
        assert_eq!(seen.borrow().as_slice(), ["ignored".to_string()]);
    }

    #[test]
    fn verbatim_inserts_escape_literally() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"\x16\x1b").expect("input"); // Ctrl-V then ESC
        assert_eq!(ed.buffer().text(), "\u{1b}");
    }

    #[test]
    fn custom_handler_takes_precedence() {
        let mut ed = editor();
        ed.bind_handler(
            KeyEvent::new(KeyCode::Char('g'), KeyModifiers::CTRL),
            |ctx| {
                ctx.buffer.insert_str("[magic]");
                true
            },
        );
        start(&mut ed);
        ed.handle_input(b"\x07").expect("input"); // raw Ctrl-G byte
        assert_eq!(ed.buffer().text(), "[magic]");
    }

    #[test]
    fn custom_insert_binding_sequence() {
        let mut ed = editor();
        ed.bind(
            [KeyEvent::alt('g'), KeyEvent::plain('s')],
            BindingAction::Insert("git status".into()),
        );
        start(&mut ed);
        ed.handle_input(b"\x1bgs").expect("input");
        assert_eq!(ed.buffer().text(), "git status");
        // A dead prefix replays as literals.
        ed.handle_input(b"\x1bgx").expect("input");
        assert_eq!(ed.buffer().text(), "git statusx");
    }

    #[test]
    fn finish_returns_buffer_as_is() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"partial").expect("input");
        ed.finish();
        ed.handle_input(b"!").expect("input");
        match ed.take_result() {
            Some(SessionResult::Finished(text)) => assert_eq!(text, "partial!"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn resize_defers_until_safe_point_and_queries_origin() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"abc").expect("input");
        ed.notify_resize(40, 12);
        // Mid-sequence: resize must not apply while an escape is open.
        ed.handle_input(b"\x1b[").expect("input");
        ed.handle_input(b"A").expect("input");
        let out = String::from_utf8(std::mem::take(output(&mut ed))).expect("utf8");
        assert!(out.contains("\x1b[6n"), "missing DSR query: {out:?}");
        // The DSR response is consumed, not inserted.
        ed.handle_input(b"\x1b[3;1R").expect("input");
        assert_eq!(ed.buffer().text(), "abc");
    }

    fn output<'a>(ed: &'a mut Editor<Vec<u8>>) -> &'a mut Vec<u8> {
        &mut ed.out
    }

    #[test]
    fn display_refresh_callback_sees_snapshots() {
        use std::cell::RefCell;
        use std::rc::Rc;
        let snaps: Rc<RefCell<Vec<String>>> = Rc::default();
        let snaps_cb = snaps.clone();
        let mut ed = editor();
        ed.on_display_refresh(move |ctx| snaps_cb.borrow_mut().push(ctx.text.clone()));
        start(&mut ed);
        ed.handle_input(b"ab").expect("input");
        assert_eq!(snaps.borrow().last().map(String::as_str), Some("ab"));
    }

    #[test]
    fn masked_input_renders_substitutes() {
        let mut ed = editor();
        start(&mut ed);
        ed.handle_input(b"hunter2").expect("input");
        ed.set_mask(Span::new(0, 7), Mask::per_char("*")).expect("mask");
        let out = String::from_utf8(std::mem::take(output(&mut ed))).expect("utf8");
        assert!(out.contains("*******"));
        // The secret only appears from the pre-mask echo, never after.
        let after_mask = out.rsplit("*******").next().unwrap_or("");
        assert!(!after_mask.contains("hunter2"));
    }
}
