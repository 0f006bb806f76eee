//! # Logger Service
//!
//! This crate implements an in-memory sink for the `log` facade. Every crate
//! of the framework logs through `log::debug!` and friends; tests install
//! [`MemoryLogger`] to look at what was logged.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Entries keep their level, target and source location as separate fields
//! so a test can ask "was a warning logged by the dispatcher" without
//! matching on formatted lines.

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::OnceLock;

/// Entries kept before the oldest are dropped
pub const DEFAULT_CAPACITY: usize = 4096;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Logging crate or module
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Value of the first field named `key`
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn from_record(record: &Record<'_>) -> Self {
        let mut entry = Self::new(
            record.level().into(),
            record.target(),
            record.args().to_string(),
        );
        if let Some(module) = record.module_path() {
            entry = entry.with_field("module", module);
        }
        if let Some(file) = record.file() {
            entry = entry.with_field("file", file);
        }
        if let Some(line) = record.line() {
            entry = entry.with_field("line", line.to_string());
        }
        entry
    }
}

/// A `log` backend that keeps the most recent entries in memory
pub struct MemoryLogger {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    level: LevelFilter,
}

impl MemoryLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self::with_capacity(level, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(level: LevelFilter, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            level,
        }
    }

    /// Copies of all kept entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Removes and returns all kept entries
    pub fn take(&self) -> Vec<LogEntry> {
        self.entries.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// True when an entry at `level` or above contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.level >= level && entry.message.contains(needle))
    }

    /// Entries whose target starts with `prefix`
    pub fn for_target(&self, prefix: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.target.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Stores an entry directly, bypassing the facade
    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

impl Log for MemoryLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.push(LogEntry::from_record(record));
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<MemoryLogger> = OnceLock::new();

/// Installs the process-wide logger at `Trace`
///
/// Safe to call from every test; the first call installs, later calls
/// return the same logger.
pub fn init() -> &'static MemoryLogger {
    let mut installed = false;
    let logger = LOGGER.get_or_init(|| {
        installed = true;
        MemoryLogger::new(LevelFilter::Trace)
    });
    if installed {
        match log::set_logger(logger) {
            Ok(()) => log::set_max_level(LevelFilter::Trace),
            Err(err) => eprintln!("services_logger: another logger is installed: {}", err),
        }
    }
    logger
}
