//! Bounded game log: the typed record of every user-visible state change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_LOG_CAPACITY: usize = 100;
/// Character cap for log text mirrored into diagnostics or a terminal.
pub const MAX_LINE_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Info,
    Combat,
    Gain,
    Loss,
    Danger,
    Quest,
    Adventure,
    Warning,
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Info => "info",
            LogCategory::Combat => "combat",
            LogCategory::Gain => "gain",
            LogCategory::Loss => "loss",
            LogCategory::Danger => "danger",
            LogCategory::Quest => "quest",
            LogCategory::Adventure => "adventure",
            LogCategory::Warning => "warning",
            LogCategory::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: u64,
    pub category: LogCategory,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl LogEntry {
    /// The message flattened for a single output line.
    pub fn one_line(&self) -> String {
        flatten(&self.message, MAX_LINE_CHARS)
    }
}

/// Fold whitespace runs (line breaks included) into one space, drop other
/// control characters and cut after `max_chars` with an ellipsis.
pub fn flatten(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max_chars) + 3);
    let mut kept = 0;
    let mut gap = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            gap = true;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        let needed = if gap { 2 } else { 1 };
        if kept + needed > max_chars {
            out.push('…');
            break;
        }
        if gap {
            out.push(' ');
            gap = false;
        }
        out.push(ch);
        kept += needed;
    }
    out
}

#[derive(Debug, Clone)]
pub struct GameLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for GameLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl GameLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Rebuild a log from a persisted tail, keeping only the newest `capacity` entries.
    pub fn from_entries(entries: Vec<LogEntry>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        log.next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let skip = entries.len().saturating_sub(log.capacity);
        log.entries.extend(entries.into_iter().skip(skip));
        log
    }

    pub fn push(&mut self, category: LogCategory, message: impl Into<String>, at: DateTime<Utc>) {
        let message = message.into();
        log::debug!("[{}] {}", category.as_str(), flatten(&message, MAX_LINE_CHARS));
        let entry = LogEntry {
            id: self.next_id,
            category,
            message,
            at,
        };
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// The newest `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn since(&self, id: u64) -> Vec<LogEntry> {
        self.entries.iter().filter(|e| e.id > id).cloned().collect()
    }

    pub fn last_id(&self) -> u64 {
        self.next_id - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_are_dropped_at_capacity() {
        let mut log = GameLog::new(3);
        let now = Utc::now();
        for i in 0..5 {
            log.push(LogCategory::Info, format!("entry {}", i), now);
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(log.last_id(), 5);
    }

    #[test]
    fn restored_log_continues_numbering() {
        let mut log = GameLog::new(10);
        let now = Utc::now();
        log.push(LogCategory::Gain, "a", now);
        log.push(LogCategory::Loss, "b", now);
        let mut restored = GameLog::from_entries(log.tail(10), 10);
        restored.push(LogCategory::Info, "c", now);
        assert_eq!(restored.latest().map(|e| e.id), Some(3));
        assert_eq!(restored.since(1).len(), 2);
    }

    #[test]
    fn flattened_text_fits_one_line() {
        assert_eq!(
            flatten("  The furnace cracks.\n\tSmoke\r\n fills  the room\u{7}  ", 100),
            "The furnace cracks. Smoke fills the room"
        );
        assert_eq!(flatten("abc def", 5), "abc d…");
        assert_eq!(flatten("abcdef", 6), "abcdef");
        let entry = LogEntry {
            id: 1,
            category: LogCategory::Info,
            message: "x".repeat(MAX_LINE_CHARS + 10),
            at: Utc::now(),
        };
        assert_eq!(entry.one_line().chars().count(), MAX_LINE_CHARS + 1);
    }
}
