//! redline demo REPL: reads lines with full editing, echoes them back, and
//! persists history across runs.

use anyhow::Result;
use clap::Parser;
use core_history::{HistControl, History};
use redline::{CompletionSuggestion, Editor, Error};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "redline", version, about = "Interactive line editor demo")]
struct Args {
    /// Optional configuration file path (overrides discovery of `redline.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// History file (overrides the configured path).
    #[arg(long = "history")]
    history: Option<PathBuf>,
    /// Prompt string (overrides the configured prompt).
    #[arg(long = "prompt")]
    prompt: Option<String>,
    /// Log at debug level when RUST_LOG is unset.
    #[arg(long, short)]
    verbose: bool,
}

/// File logging: stdout belongs to the editor, so diagnostics go to
/// `redline.log`. The returned guard must live for the process lifetime or
/// buffered lines are lost.
fn init_logging(verbose: bool) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(".", "redline.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

const DEMO_COMMANDS: &[&str] = &[
    "help", "history", "exit", "echo", "status", "stash", "start", "stop",
];

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.verbose);

    let config = core_config::load_from(args.config.clone())?;
    let history_path = args.history.clone().unwrap_or_else(|| config.history_path());
    let prompt = args
        .prompt
        .clone()
        .unwrap_or_else(|| config.prompt().to_string());

    let mut editor = Editor::new();
    editor.set_history(History::with_policy(
        config.history_capacity(),
        HistControl::from_env(),
    ));
    if !editor.load_history(&history_path) {
        warn!(target: "repl.startup", path = %history_path.display(), "history_load_failed");
    }
    editor.on_tab_complete(|ctx| {
        DEMO_COMMANDS
            .iter()
            .filter(|cmd| !ctx.word.is_empty() && cmd.starts_with(&ctx.word))
            .map(|cmd| CompletionSuggestion::new(*cmd))
            .collect()
    });

    info!(
        target: "repl.startup",
        history = %history_path.display(),
        capacity = config.history_capacity(),
        "started"
    );

    loop {
        match editor.get_line(&prompt) {
            Ok(line) => {
                if line == "exit" {
                    break;
                }
                if line == "history" {
                    for entry in editor.history().iter() {
                        println!("{}  {}", entry.timestamp, entry.text);
                    }
                } else if !line.is_empty() {
                    println!("{line}");
                }
                editor.add_to_history(&line);
            }
            Err(Error::Interrupted) => continue,
            Err(Error::Eof) | Err(Error::Empty) => break,
            Err(err) => {
                warn!(target: "repl.session", error = %err, "fatal");
                return Err(err.into());
            }
        }
    }

    if !editor.save_history(&history_path) {
        warn!(target: "repl.shutdown", path = %history_path.display(), "history_save_failed");
    }
    info!(target: "repl.shutdown", "bye");
    Ok(())
}
