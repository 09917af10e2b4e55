//! Line sinks for the JSON telemetry adapter.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// A sink that receives pre-formatted lines (each ending in `\n`).
pub trait LogSink: Send + Sync {
    /// Write a line to the sink.
    fn write_line(&self, line: &str);
}

/// Log sink that writes to stderr.
#[derive(Debug, Default)]
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn write_line(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        if let Err(error) = stderr.write_all(line.as_bytes()) {
            tracing::warn!(%error, "metrics line dropped");
        }
    }
}

/// Log sink that keeps lines in memory; clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every buffered line.
    pub fn take(&self) -> Vec<String> {
        let mut guard = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }

    /// Number of buffered lines.
    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemoryLogSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_captures_lines() {
        let sink = MemoryLogSink::new();
        let shared = sink.clone();
        sink.write_line("hello\n");
        shared.write_line("world\n");

        assert_eq!(sink.len(), 2);
        assert_eq!(shared.take(), vec!["hello\n", "world\n"]);
        assert!(sink.is_empty());
    }
}
