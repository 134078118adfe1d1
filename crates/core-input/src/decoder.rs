use std::sync::atomic::Ordering::Relaxed;

use core_events::{
    DECODE_BYTES_DISCARDED, DECODE_UNKNOWN_CSI, InputEvent, KEYS_DECODED, KeyCode, KeyEvent,
    KeyModifiers, PASTE_BYTES, PASTE_SESSIONS,
};
use tracing::{debug, trace, warn};

const ESC: char = '\u{1b}';
const CTRL_V: char = '\u{16}';
const PASTE_STOP: &str = "\u{1b}[201~";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Free,
    /// Saw ESC; the next code point decides Alt-key vs CSI.
    GotEscape,
    /// CSI parameter bytes (0x30–0x3F).
    CsiParameter,
    /// CSI intermediate bytes (0x20–0x2F); a final byte (0x40–0x7E) ends the
    /// sequence from either CSI state.
    CsiIntermediate,
    /// Ctrl-V armed: the next code point is inserted literally.
    Verbatim,
    /// Bracketed paste body: nothing is interpreted as a key binding.
    Paste,
    /// ESC seen inside a paste; it may start the terminating CSI.
    PasteEscape,
    /// `ESC [` seen inside a paste; accumulating until the final byte tells
    /// us whether this is the `201~` terminator.
    PasteCsi,
}

/// The input decoding state machine. Feed it raw bytes, get logical events.
#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
    /// Bytes carried over between chunks (incomplete UTF-8 tail).
    backlog: Vec<u8>,
    /// Accumulated CSI parameter bytes of the in-flight sequence.
    params: String,
    intermediates: String,
    paste_buf: String,
    /// Code points tentatively belonging to a CSI inside a paste; flushed
    /// into the paste body if the sequence turns out not to be `201~`.
    paste_pending: String,
    verbatim_enabled: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the binding system accepts Ctrl-V as verbatim-insert. When
    /// disabled, 0x16 passes through as an ordinary key.
    pub fn set_verbatim_enabled(&mut self, enabled: bool) {
        self.verbatim_enabled = enabled;
    }

    /// True while an escape sequence (or paste) is partially consumed.
    /// Callers use this to defer work that must not split a sequence.
    pub fn mid_sequence(&self) -> bool {
        self.state != State::Free || !self.backlog.is_empty()
    }

    /// Arm the verbatim state directly: the next code point is emitted as
    /// [`InputEvent::Verbatim`] regardless of what it is. Used when a key
    /// other than Ctrl-V is bound to verbatim insertion.
    pub fn arm_verbatim(&mut self) {
        if self.state == State::Free {
            self.state = State::Verbatim;
        }
    }

    /// Consume one chunk of raw bytes, producing the logical events fully
    /// decodable so far.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<InputEvent> {
        let mut data = std::mem::take(&mut self.backlog);
        data.extend_from_slice(bytes);

        let mut out = Vec::new();
        let mut pos = 0usize;
        let mut discarded = 0u64;
        while pos < data.len() {
            match std::str::from_utf8(&data[pos..]) {
                Ok(valid) => {
                    for c in valid.chars() {
                        self.step(c, &mut out);
                    }
                    pos = data.len();
                }
                Err(err) => {
                    if let Ok(valid) = std::str::from_utf8(&data[pos..pos + err.valid_up_to()]) {
                        for c in valid.chars() {
                            self.step(c, &mut out);
                        }
                    }
                    pos += err.valid_up_to();
                    match err.error_len() {
                        Some(_) => {
                            // Garbage byte: drop exactly one and rescan, so a
                            // desynced stream recovers at the first valid
                            // boundary.
                            pos += 1;
                            discarded += 1;
                        }
                        None => break, // incomplete tail, wait for more bytes
                    }
                }
            }
        }
        self.backlog = data[pos..].to_vec();

        if discarded > 0 {
            DECODE_BYTES_DISCARDED.fetch_add(discarded, Relaxed);
            warn!(target: "input.decode", bytes = discarded, "discarded_invalid_utf8");
        }
        out
    }

    fn step(&mut self, c: char, out: &mut Vec<InputEvent>) {
        // NUL is ignored regardless of state.
        if c == '\0' {
            return;
        }
        match self.state {
            State::Free => match c {
                ESC => self.state = State::GotEscape,
                CTRL_V if self.verbatim_enabled => self.state = State::Verbatim,
                _ => self.emit_key(KeyEvent::plain(c), out),
            },
            State::GotEscape => {
                if c == '[' {
                    self.params.clear();
                    self.intermediates.clear();
                    self.state = State::CsiParameter;
                } else {
                    self.state = State::Free;
                    self.emit_key(KeyEvent::alt(c), out);
                }
            }
            State::CsiParameter => match c as u32 {
                0x30..=0x3f => self.params.push(c),
                0x20..=0x2f => {
                    self.intermediates.push(c);
                    self.state = State::CsiIntermediate;
                }
                0x40..=0x7e => self.complete_csi(c, out),
                _ => self.malformed_csi(c),
            },
            State::CsiIntermediate => match c as u32 {
                0x20..=0x2f => self.intermediates.push(c),
                0x40..=0x7e => self.complete_csi(c, out),
                _ => self.malformed_csi(c),
            },
            State::Verbatim => {
                self.state = State::Free;
                out.push(InputEvent::Verbatim(c));
            }
            State::Paste => {
                if c == ESC {
                    self.paste_pending.clear();
                    self.paste_pending.push(ESC);
                    self.state = State::PasteEscape;
                } else {
                    self.paste_buf.push(c);
                }
            }
            State::PasteEscape => {
                if c == '[' {
                    self.paste_pending.push(c);
                    self.state = State::PasteCsi;
                } else if c == ESC {
                    // The previous ESC was content; this one may still start
                    // the terminator.
                    self.paste_buf.push(ESC);
                } else {
                    // Not a CSI: the ESC was paste content after all.
                    self.paste_buf.push_str(&self.paste_pending);
                    self.paste_buf.push(c);
                    self.paste_pending.clear();
                    self.state = State::Paste;
                }
            }
            State::PasteCsi => match c as u32 {
                0x20..=0x3f => self.paste_pending.push(c), // parameters, keep going
                0x40..=0x7e => {
                    self.paste_pending.push(c);
                    if self.paste_pending == PASTE_STOP {
                        self.finish_paste(out);
                    } else {
                        // Some other escape pasted verbatim: keep it as
                        // literal content, uninterpreted.
                        self.paste_buf.push_str(&self.paste_pending);
                        self.state = State::Paste;
                    }
                    self.paste_pending.clear();
                }
                _ => {
                    // Abandon the tentative CSI; an ESC here may itself start
                    // the terminator.
                    self.paste_buf.push_str(&self.paste_pending);
                    self.paste_pending.clear();
                    if c == ESC {
                        self.paste_pending.push(ESC);
                        self.state = State::PasteEscape;
                    } else {
                        self.paste_buf.push(c);
                        self.state = State::Paste;
                    }
                }
            },
        }
    }

    fn emit_key(&mut self, key: KeyEvent, out: &mut Vec<InputEvent>) {
        KEYS_DECODED.fetch_add(1, Relaxed);
        trace!(target: "input.decode", key = %key, "key");
        out.push(InputEvent::Key(key));
    }

    fn malformed_csi(&mut self, c: char) {
        DECODE_UNKNOWN_CSI.fetch_add(1, Relaxed);
        debug!(target: "input.decode", byte = c as u32, "malformed_csi_dropped");
        self.state = State::Free;
    }

    fn complete_csi(&mut self, final_byte: char, out: &mut Vec<InputEvent>) {
        self.state = State::Free;
        let params: Vec<u32> = self
            .params
            .split(';')
            .map(|p| p.parse().unwrap_or(0))
            .collect();
        let p1 = params.first().copied().unwrap_or(0);
        let p2 = params.get(1).copied().unwrap_or(0);
        let mods = KeyModifiers::from_csi_param(p2);
        self.params.clear();
        self.intermediates.clear();

        let key = |code| KeyEvent::new(code, mods);
        match final_byte {
            'A' => self.emit_key(key(KeyCode::Up), out),
            'B' => self.emit_key(key(KeyCode::Down), out),
            'C' => self.emit_key(key(KeyCode::Right), out),
            'D' => self.emit_key(key(KeyCode::Left), out),
            'H' => self.emit_key(key(KeyCode::Home), out),
            'F' => self.emit_key(key(KeyCode::End), out),
            'Z' => self.emit_key(key(KeyCode::BackTab), out),
            'R' => {
                // DSR response: ESC [ row ; col R. The second parameter is a
                // column here, not a modifier.
                out.push(InputEvent::CursorReport {
                    row: p1.min(u16::MAX as u32) as u16,
                    col: p2.min(u16::MAX as u32) as u16,
                });
            }
            '~' => match p1 {
                1 | 7 => self.emit_key(key(KeyCode::Home), out),
                4 | 8 => self.emit_key(key(KeyCode::End), out),
                3 => self.emit_key(key(KeyCode::Delete), out),
                200 => {
                    PASTE_SESSIONS.fetch_add(1, Relaxed);
                    trace!(target: "input.paste", "start");
                    self.paste_buf.clear();
                    self.state = State::Paste;
                }
                201 => {
                    // Stray stop marker with no paste in flight.
                    debug!(target: "input.paste", "unmatched_stop");
                }
                other => {
                    DECODE_UNKNOWN_CSI.fetch_add(1, Relaxed);
                    debug!(target: "input.decode", param = other, "unknown_tilde_sequence");
                }
            },
            other => {
                DECODE_UNKNOWN_CSI.fetch_add(1, Relaxed);
                debug!(target: "input.decode", final_byte = other as u32, "unknown_csi_final");
            }
        }
    }

    fn finish_paste(&mut self, out: &mut Vec<InputEvent>) {
        self.state = State::Free;
        let content = std::mem::take(&mut self.paste_buf);
        PASTE_BYTES.fetch_add(content.len() as u64, Relaxed);
        trace!(target: "input.paste", len = content.len(), "end");
        out.push(InputEvent::Paste(content));
    }
}
