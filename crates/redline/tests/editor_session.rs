//! Whole-editor sessions driven through the public API against an in-memory
//! terminal sink.

use redline::{
    BindingAction, CompletionSuggestion, Editor, KeyEvent, Mask, SessionResult, Span, Style,
};

fn editor() -> Editor<Vec<u8>> {
    let mut ed = Editor::with_output(Vec::new(), 80, 24);
    ed.begin_session("repl> ").expect("session");
    ed
}

#[test]
fn insert_api_matches_typed_input() {
    let mut ed = editor();
    ed.insert("hello").expect("insert");
    ed.handle_input(b" world").expect("input");
    assert_eq!(ed.buffer().text(), "hello world");
    assert_eq!(ed.buffer().cursor(), 11);
    let metrics = ed.buffer().metrics(None);
    assert_eq!(metrics.lines[0].visible_length, 11);
}

#[test]
fn session_returns_line_on_enter() {
    let mut ed = editor();
    ed.handle_input(b"echo ok\r").expect("input");
    assert_eq!(ed.take_result(), Some(SessionResult::Line("echo ok".into())));
}

#[test]
fn history_capacity_example() {
    let mut ed = Editor::with_output(Vec::new(), 80, 24);
    ed.set_history(redline::History::with_policy(
        2,
        redline::HistControl::default(),
    ));
    ed.add_to_history("a");
    ed.add_to_history("b");
    ed.add_to_history("c");
    let texts: Vec<&str> = ed.history().iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["b", "c"]);
}

#[test]
fn history_round_trip_across_editors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history");

    let mut first = editor();
    first.add_to_history("one");
    first.add_to_history("two");
    assert!(first.save_history(&path));

    let mut second = editor();
    assert!(second.load_history(&path));
    second.handle_input(b"\x1b[A").expect("input");
    assert_eq!(second.buffer().text(), "two");
    second.handle_input(b"\x1b[A").expect("input");
    assert_eq!(second.buffer().text(), "one");
}

#[test]
fn recall_then_edit_then_accept() {
    let mut ed = editor();
    ed.add_to_history("cargo build");
    ed.handle_input(b"\x1b[A").expect("input");
    assert_eq!(ed.buffer().text(), "cargo build");
    ed.handle_input(b" --release\r").expect("input");
    assert_eq!(
        ed.take_result(),
        Some(SessionResult::Line("cargo build --release".into()))
    );
}

#[test]
fn styled_span_survives_prepended_text() {
    let mut ed = editor();
    ed.handle_input(b"warn: disk full").expect("input");
    let style = Style {
        bold: true,
        ..Style::default()
    };
    ed.stylize_anchored(Span::new(6, 15), &style).expect("stylize");

    // Prepend text; the anchored region must still cover "disk full".
    for _ in 0..15 {
        ed.handle_input(b"\x1b[D").expect("input");
    }
    ed.handle_input(b">> ").expect("input");
    assert_eq!(ed.buffer().text(), ">> warn: disk full");
    let spans: Vec<_> = ed.buffer().styles().anchored.iter().collect();
    assert_eq!(spans.len(), 1);
    assert_eq!(ed.buffer().text_range(spans[0].0), "disk full");
}

#[test]
fn password_mask_never_echoes_secret() {
    let mut ed = editor();
    ed.set_mask(Span::new(0, usize::MAX / 2), Mask::per_char("•"))
        .expect("mask");
    ed.handle_input(b"s3cr3t\r").expect("input");
    assert_eq!(ed.take_result(), Some(SessionResult::Line("s3cr3t".into())));
}

#[test]
fn completion_with_custom_binding() {
    let mut ed = editor();
    ed.on_tab_complete(|ctx| {
        if ctx.word.starts_with("st") {
            vec![CompletionSuggestion::new("status")]
        } else {
            Vec::new()
        }
    });
    ed.bind(
        [KeyEvent::alt('x')],
        BindingAction::Insert("git ".into()),
    );
    ed.handle_input(b"\x1bxst\t\r").expect("input");
    assert_eq!(ed.take_result(), Some(SessionResult::Line("git status".into())));
}

#[test]
fn multiline_paste_stays_one_logical_edit() {
    let mut ed = editor();
    ed.handle_input(b"\x1b[200~first\nsecond\x1b[201~\r")
        .expect("input");
    assert_eq!(
        ed.take_result(),
        Some(SessionResult::Line("first\nsecond".into()))
    );
}

#[test]
fn second_session_starts_clean() {
    let mut ed = editor();
    ed.handle_input(b"stale\x03").expect("input");
    assert_eq!(ed.take_result(), Some(SessionResult::Interrupted));

    ed.begin_session("repl> ").expect("session");
    assert!(ed.buffer().is_empty());
    ed.handle_input(b"fresh\r").expect("input");
    assert_eq!(ed.take_result(), Some(SessionResult::Line("fresh".into())));
}
