//! Bounded command history with `HISTCONTROL` filtering, prefix-aware
//! recall, and a timestamp-ordered merge against on-disk history.
//!
//! On-disk format: records separated by a blank line, each record
//! `"{unix_timestamp}::{text}"`. Text may contain single newlines; a missing
//! file is an empty history, not an error.

use std::collections::VecDeque;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub text: String,
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            timestamp,
        }
    }
}

/// `HISTCONTROL`-style admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistControl {
    /// Skip an entry equal to the immediately previous one.
    pub ignore_dups: bool,
    /// Skip entries starting with a space.
    pub ignore_space: bool,
}

impl HistControl {
    /// Parse the colon-separated `HISTCONTROL` value
    /// (`ignoredups`/`ignorespace`/`ignoreboth`); unknown tokens are ignored.
    pub fn parse(value: &str) -> Self {
        let mut out = Self::default();
        for token in value.split(':') {
            match token {
                "ignoredups" => out.ignore_dups = true,
                "ignorespace" => out.ignore_space = true,
                "ignoreboth" => {
                    out.ignore_dups = true;
                    out.ignore_space = true;
                }
                _ => {}
            }
        }
        out
    }

    pub fn from_env() -> Self {
        match std::env::var("HISTCONTROL") {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::default(),
        }
    }
}

#[derive(Debug)]
struct NavState {
    /// Index into `entries` currently recalled.
    index: usize,
    /// The line being edited when recall started, restored when navigating
    /// past the newest entry.
    saved_line: String,
    /// Prefix filter captured at recall start.
    prefix: String,
}

/// Process-lifetime command history: a capacity-bounded ring, newest at the
/// back.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    policy: HistControl,
    nav: Option<NavState>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            policy: HistControl::from_env(),
            nav: None,
        }
    }

    pub fn with_policy(capacity: usize, policy: HistControl) -> Self {
        Self {
            policy,
            ..Self::new(capacity)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Append a line, subject to the admission policy. Returns whether the
    /// entry was accepted. The oldest entry is evicted over capacity.
    pub fn add(&mut self, line: &str) -> bool {
        self.nav = None;
        if line.is_empty() {
            return false;
        }
        if self.policy.ignore_space && line.starts_with(' ') {
            debug!(target: "history.add", "skipped_leading_space");
            return false;
        }
        if self.policy.ignore_dups
            && self.entries.back().is_some_and(|e| e.text == line)
        {
            debug!(target: "history.add", "skipped_duplicate");
            return false;
        }
        self.entries.push_back(HistoryEntry::new(line, now_unix()));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    /// Recall the previous (older) matching entry. On the first call of a
    /// recall session, `current_line` is saved and becomes the prefix
    /// filter; subsequent calls step further back.
    pub fn search_backwards(&mut self, current_line: &str) -> Option<&str> {
        let start = match &self.nav {
            Some(nav) => nav.index,
            None => {
                self.nav = Some(NavState {
                    index: self.entries.len(),
                    saved_line: current_line.to_string(),
                    prefix: current_line.to_string(),
                });
                self.entries.len()
            }
        };
        let prefix = self.nav.as_ref().map(|n| n.prefix.clone()).unwrap_or_default();
        let found = self.entries.iter().enumerate().take(start).rev().find(
            |(_, e)| e.text.starts_with(&prefix),
        );
        match found {
            Some((i, _)) => {
                if let Some(nav) = self.nav.as_mut() {
                    nav.index = i;
                }
                self.entries.get(i).map(|e| e.text.as_str())
            }
            None => None,
        }
    }

    /// Recall the next (newer) matching entry; stepping past the newest
    /// restores the saved line and ends the recall session.
    pub fn search_forwards(&mut self) -> Option<String> {
        let nav = self.nav.as_mut()?;
        let prefix = nav.prefix.clone();
        let next = self
            .entries
            .iter()
            .enumerate()
            .skip(nav.index + 1)
            .find(|(_, e)| e.text.starts_with(&prefix));
        match next {
            Some((i, e)) => {
                let text = e.text.clone();
                nav.index = i;
                Some(text)
            }
            None => {
                let saved = self.nav.take().map(|n| n.saved_line);
                saved
            }
        }
    }

    /// Forget any in-progress recall (called when the user edits the line).
    pub fn reset_navigation(&mut self) {
        self.nav = None;
    }

    /// Load entries from `path`, replacing the current contents. A missing
    /// file is an empty history and returns `true`; only I/O or wholesale
    /// parse failures return `false`.
    pub fn load(&mut self, path: &Path) -> bool {
        self.nav = None;
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "history.io", "no_history_file");
                self.entries.clear();
                return true;
            }
            Err(err) => {
                warn!(target: "history.io", error = %err, "load_failed");
                return false;
            }
        };
        let mut entries = parse_records(&raw);
        entries.sort_by_key(|e| e.timestamp);
        let skip = entries.len().saturating_sub(self.capacity);
        self.entries = entries.into_iter().skip(skip).collect();
        info!(target: "history.io", entries = self.entries.len(), "loaded");
        true
    }

    /// Merge the in-memory entries with whatever is on disk and write the
    /// result back. Returns `false` on I/O failure.
    pub fn save(&mut self, path: &Path) -> bool {
        let disk = std::fs::read_to_string(path)
            .map(|raw| {
                let mut entries = parse_records(&raw);
                entries.sort_by_key(|e| e.timestamp);
                entries
            })
            .unwrap_or_default();
        let memory: Vec<HistoryEntry> = self.entries.iter().cloned().collect();
        let merged = merge(&disk, &memory);
        let mut out = String::new();
        for (i, entry) in merged.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&format!("{}::{}", entry.timestamp, entry.text));
        }
        out.push('\n');
        match std::fs::write(path, out) {
            Ok(()) => {
                info!(target: "history.io", entries = merged.len(), "saved");
                true
            }
            Err(err) => {
                warn!(target: "history.io", error = %err, "save_failed");
                false
            }
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn parse_records(raw: &str) -> Vec<HistoryEntry> {
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for record in raw.split("\n\n") {
        let record = record.strip_suffix('\n').unwrap_or(record);
        if record.is_empty() {
            continue;
        }
        match record.split_once("::") {
            Some((ts, text)) => match ts.trim().parse::<i64>() {
                Ok(timestamp) => out.push(HistoryEntry::new(text, timestamp)),
                Err(_) => skipped += 1,
            },
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(target: "history.io", records = skipped, "skipped_unparseable_records");
    }
    out
}

/// Stable two-pointer merge of two timestamp-ascending entry lists.
///
/// Whitespace-only entries from the pre-existing (`disk`) side are skipped,
/// and entries whose text equals the last emitted entry's text are elided so
/// repeated commands across sessions do not balloon the file.
pub fn merge(disk: &[HistoryEntry], memory: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut out: Vec<HistoryEntry> = Vec::with_capacity(disk.len() + memory.len());
    let mut i = 0usize;
    let mut j = 0usize;
    let mut push = |out: &mut Vec<HistoryEntry>, entry: &HistoryEntry| {
        if out.last().is_some_and(|last| last.text == entry.text) {
            return;
        }
        out.push(entry.clone());
    };
    while i < disk.len() || j < memory.len() {
        let take_disk = match (disk.get(i), memory.get(j)) {
            (Some(d), Some(m)) => d.timestamp <= m.timestamp,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if take_disk {
            let entry = &disk[i];
            i += 1;
            if entry.text.trim().is_empty() {
                continue;
            }
            push(&mut out, entry);
        } else {
            let entry = &memory[j];
            j += 1;
            push(&mut out, entry);
        }
    }
    out
}
