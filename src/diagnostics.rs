//! Diagnostic sinks
//!
//! Every component that reports on execution receives a [`DiagnosticSink`] when it
//! is constructed. The default [`TracingSink`] forwards messages to `tracing`;
//! [`MemorySink`] keeps them in memory so callers (and tests) can inspect what
//! happened during a call.

use std::sync::Mutex;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for human-readable execution and error messages
pub trait DiagnosticSink: Send + Sync {
    /// Record a message at the given level
    fn emit(&self, level: DiagnosticLevel, message: &str);

    fn debug(&self, message: &str) {
        self.emit(DiagnosticLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(DiagnosticLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(DiagnosticLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(DiagnosticLevel::Error, message);
    }
}

/// Sink forwarding to the `tracing` macros
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: DiagnosticLevel, message: &str) {
        match level {
            DiagnosticLevel::Debug => tracing::debug!(target: "schemaforge", "{}", message),
            DiagnosticLevel::Info => tracing::info!(target: "schemaforge", "{}", message),
            DiagnosticLevel::Warn => tracing::warn!(target: "schemaforge", "{}", message),
            DiagnosticLevel::Error => tracing::error!(target: "schemaforge", "{}", message),
        }
    }
}

/// Sink collecting messages in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(DiagnosticLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, oldest first
    pub fn entries(&self) -> Vec<(DiagnosticLevel, String)> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages recorded at exactly `level`
    pub fn messages_at(&self, level: DiagnosticLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, level: DiagnosticLevel, message: &str) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((level, message.to_string()));
    }
}
