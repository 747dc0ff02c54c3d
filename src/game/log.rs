//! Append-only battle log

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    System,
    Move,
    Attack,
    Kill,
    Win,
    Heal,
    Surrender,
}

/// One narrated action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Unix milliseconds
    pub time: u64,
}

/// Ordered record of resolved actions. Entries are never reordered or removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: LogKind, text: impl Into<String>, time: u64) {
        self.entries.push(LogEntry {
            text: text.into(),
            kind,
            time,
        });
    }

    /// Chronological order. Clients read the serialized list instead.
    #[cfg(test)]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }
}
