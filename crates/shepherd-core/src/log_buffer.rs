//! Bounded, timestamped line store kept for every managed process.

use std::{collections::VecDeque, fmt};

use chrono::{SecondsFormat, Utc};
use shepherd_types::DEFAULT_MAX_LOG_ENTRIES;

/// Longest entry body, in characters, kept verbatim.
pub const MAX_LINE_LENGTH: usize = 5000;
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Origin of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    Stdout,
    Stderr,
    System,
    Error,
    Exit,
}

impl LogStream {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::System => "system",
            Self::Error => "error",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FIFO buffer of formatted log entries with a hard entry cap.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<String>,
    max_entries: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_ENTRIES)
    }
}

impl LogBuffer {
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Append a tagged line, e.g. `add(LogStream::Stdout, "listening")`.
    pub fn add(&mut self, stream: LogStream, message: &str) {
        self.add_line(&format!("[{stream}] {message}"));
    }

    /// Append `raw` prefixed with the capture time, evicting the oldest entries
    /// once the buffer grows past its capacity.
    pub fn add_line(&mut self, raw: &str) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let entry = format!("[{timestamp}] {}", truncate(raw));
        self.entries.push_back(entry);
        self.evict();
    }

    /// All entries, oldest first, or only the last `count` of them.
    #[must_use]
    pub fn get_lines(&self, count: Option<usize>) -> Vec<String> {
        let skip = count.map_or(0, |count| self.entries.len().saturating_sub(count));
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        let overflow = self.entries.len().saturating_sub(self.max_entries);
        if overflow > 0 {
            self.entries.drain(..overflow);
        }
    }
}

fn truncate(raw: &str) -> std::borrow::Cow<'_, str> {
    match raw.char_indices().nth(MAX_LINE_LENGTH) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &raw[..cut]).into(),
        None => raw.into(),
    }
}
