//! Per-request log accumulation for TRAPI responses.

use chrono::Utc;

use crate::trapi::{LogEntry, LogLevel};

/// Accumulates the structured log entries of one request.
///
/// The log starts out collecting; the first ERROR entry moves it into the
/// halted state.  A halted log keeps accepting entries of any level (they are
/// all returned to the caller), but the response assembly output must be
/// discarded and replaced by an empty knowledge graph and results list.
#[derive(Debug, Default)]
pub struct RequestLog {
    entries: Vec<LogEntry>,
    halted: bool,
}

impl RequestLog {
    /// Create an empty log in the collecting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an ERROR entry has been recorded.
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// The accumulated entries, in insertion order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Consume the log, returning the accumulated entries.
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    /// Record an ERROR entry and halt result assembly.
    pub fn error(&mut self, code: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", &message);
        self.halted = true;
        self.push(LogLevel::Error, code, message);
    }

    /// Record a WARNING entry; processing continues.
    pub fn warning(&mut self, code: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", &message);
        self.push(LogLevel::Warning, code, message);
    }

    /// Record an INFO entry.
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", &message);
        self.push(LogLevel::Info, None, message);
    }

    /// Record a DEBUG entry.
    pub fn debug(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", &message);
        self.push(LogLevel::Debug, None, message);
    }

    fn push(&mut self, level: LogLevel, code: Option<&str>, message: String) {
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            code: code.map(str::to_string),
            message,
        });
    }
}
