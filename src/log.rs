//! Operator log sinks
//!
//! The publisher never prints directly. Every operator-facing line goes
//! through a `LogSink`, which must not influence control flow.

use std::sync::Mutex;

/// Prefix attached to lines written by `StderrLogSink`.
pub const LOG_PREFIX: &str = "[artifact-publisher]";

/// Destination for plain-text operator lines.
pub trait LogSink: Send + Sync {
    /// Record a single line.
    fn log(&self, line: &str);
}

/// Writes lines to stderr.
#[derive(Debug, Default)]
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn log(&self, line: &str) {
        eprintln!("{} {}", LOG_PREFIX, line);
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&self, _line: &str) {}
}

/// Keeps lines in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded lines.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.to_string());
    }
}
