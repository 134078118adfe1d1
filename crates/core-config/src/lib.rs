//! Configuration loading and parsing.
//!
//! Parses `redline.toml` (or an override path provided by the binary),
//! extracting the history file location/capacity and the default prompt.
//! Unknown fields are ignored (TOML deserialization tolerance) so the format
//! can evolve without breaking older files. A missing file yields defaults.
//!
//! Keybinding parsing deliberately does not live here: bindings reach the
//! editor as an already-built `KeyBinding` list.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{debug, info};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

fn default_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// History file location; defaults to `~/.redline_history`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file contents, kept for diagnostics.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

impl Config {
    pub fn history_path(&self) -> PathBuf {
        match &self.file.history.path {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".redline_history"),
        }
    }

    pub fn history_capacity(&self) -> usize {
        self.file.history.capacity.max(1)
    }

    pub fn prompt(&self) -> &str {
        self.file.prompt.as_deref().unwrap_or("> ")
    }
}

/// Candidate config locations, in precedence order: `./redline.toml`, then
/// the per-user config directory.
fn discover() -> Option<PathBuf> {
    let local = PathBuf::from("redline.toml");
    if local.is_file() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("redline").join("redline.toml");
    user.is_file().then_some(user)
}

/// Load configuration. An explicit `override_path` must exist and parse; a
/// discovered file that fails to parse is an error too, but absence of any
/// file is just defaults.
pub fn load_from(override_path: Option<PathBuf>) -> Result<Config> {
    let path = match override_path {
        Some(path) => Some(path),
        None => discover(),
    };
    let Some(path) = path else {
        debug!(target: "config.load", "no_config_file");
        return Ok(Config::default());
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let file: ConfigFile =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    info!(
        target: "config.load",
        path = %path.display(),
        history_capacity = file.history.capacity,
        "loaded"
    );
    Ok(Config {
        raw: Some(raw),
        file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file() {
        let config = Config::default();
        assert_eq!(config.history_capacity(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.prompt(), "> ");
        assert!(config.history_path().ends_with(".redline_history"));
    }

    #[test]
    fn parses_history_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("redline.toml");
        std::fs::write(
            &path,
            "prompt = \"repl> \"\n[history]\npath = \"/tmp/hist\"\ncapacity = 42\n",
        )
        .expect("write config");
        let config = load_from(Some(path)).expect("load");
        assert_eq!(config.prompt(), "repl> ");
        assert_eq!(config.history_capacity(), 42);
        assert_eq!(config.history_path(), PathBuf::from("/tmp/hist"));
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("redline.toml");
        std::fs::write(&path, "future_knob = true\n[history]\ncapacity = 7\n")
            .expect("write config");
        let config = load_from(Some(path)).expect("load");
        assert_eq!(config.history_capacity(), 7);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_from(Some(dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("redline.toml");
        std::fs::write(&path, "[history]\ncapacity = 0\n").expect("write config");
        let config = load_from(Some(path)).expect("load");
        assert_eq!(config.history_capacity(), 1);
    }
}
