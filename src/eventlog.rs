//! Structured event logging for the dialog engine.
//!
//! Routing decisions, gate transitions, and checkpoint writes all flow
//! through a single [`DialogLogger`] that fans out to pluggable sinks
//! (stdout for operators, memory for tests and inspection).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels, syslog-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Source component (e.g. "engine", "router", "gate", "checkpoint").
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            thread_id: None,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Format as a single-line log string.
    pub fn format_line(&self) -> String {
        let ts = self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let thread = self
            .thread_id
            .as_deref()
            .map(|t| format!(" [{t}]"))
            .unwrap_or_default();
        format!("{ts} {} {}{} {}", self.level, self.source, thread, self.message)
    }
}

/// Trait for log output sinks.
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry);
}

/// Dispatches entries to all attached sinks above the minimum level.
pub struct DialogLogger {
    sinks: Vec<Arc<dyn LogSink>>,
    min_level: LogLevel,
}

impl DialogLogger {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            min_level: LogLevel::Trace,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn log(&self, entry: &LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        for sink in &self.sinks {
            sink.write(entry);
        }
    }

    pub fn info(&self, source: &str, thread_id: &str, message: impl Into<String>) {
        self.log(&LogEntry::new(LogLevel::Info, source, message).with_thread(thread_id));
    }

    pub fn warn(&self, source: &str, thread_id: &str, message: impl Into<String>) {
        self.log(&LogEntry::new(LogLevel::Warn, source, message).with_thread(thread_id));
    }

    pub fn error(&self, source: &str, thread_id: &str, message: impl Into<String>) {
        self.log(&LogEntry::new(LogLevel::Error, source, message).with_thread(thread_id));
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for DialogLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that writes formatted lines to stdout.
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, entry: &LogEntry) {
        println!("{}", entry.format_line());
    }
}

/// Sink that collects entries in memory (for testing / inspection).
#[derive(Default)]
pub struct MemorySink {
    entries: std::sync::Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}
