//! Diagnostic sinks.
//!
//! [`TracingDiagnosticSink`] forwards diagnostics to the process log.
//! [`RecordingDiagnosticSink`] keeps them in memory so they can be inspected.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reconcile_core::{DiagnosticSink, ManagedRecord, RecordKey, RecordUid, Severity};
use tracing::{info, warn};

/// A diagnostic attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Key of the record.
    pub key: RecordKey,

    /// Uid of the record.
    pub uid: RecordUid,

    /// Severity.
    pub severity: Severity,

    /// Short machine-readable reason.
    pub reason: String,

    /// Human-readable message.
    pub message: String,

    /// When the diagnostic was emitted.
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    /// Create a diagnostic for the given record.
    pub fn new(record: &ManagedRecord, severity: Severity, reason: &str, message: &str) -> Self {
        Self {
            key: record.key.clone(),
            uid: record.uid,
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Sink that writes diagnostics to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl TracingDiagnosticSink {
    /// Create a new sink.
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticSink for TracingDiagnosticSink {
    fn emit(&self, record: &ManagedRecord, severity: Severity, reason: &str, message: &str) {
        match severity {
            Severity::Normal => {
                info!(key = %record.key, uid = %record.uid, reason, "{}", message)
            }
            Severity::Warning => {
                warn!(key = %record.key, uid = %record.uid, reason, "{}", message)
            }
        }
    }
}

/// Sink that records every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnosticSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics emitted so far, oldest first.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Diagnostics emitted for one record.
    pub fn for_key(&self, key: &RecordKey) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .iter()
            .filter(|d| &d.key == key)
            .cloned()
            .collect()
    }

    /// Number of diagnostics with the given reason.
    pub fn count_reason(&self, reason: &str) -> usize {
        self.diagnostics
            .lock()
            .iter()
            .filter(|d| d.reason == reason)
            .count()
    }

    /// Forget every recorded diagnostic.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }
}

impl DiagnosticSink for RecordingDiagnosticSink {
    fn emit(&self, record: &ManagedRecord, severity: Severity, reason: &str, message: &str) {
        self.diagnostics
            .lock()
            .push(Diagnostic::new(record, severity, reason, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_sink() {
        let sink = RecordingDiagnosticSink::new();
        let a = ManagedRecord::new(RecordKey::new("ns", "a"), json!({}));
        let b = ManagedRecord::new(RecordKey::new("ns", "b"), json!({}));

        sink.emit(&a, Severity::Warning, "ReconcileError", "boom");
        sink.emit(&b, Severity::Normal, "Converged", "ok");
        sink.emit(&a, Severity::Warning, "ReconcileError", "boom again");

        assert_eq!(sink.diagnostics().len(), 3);
        assert_eq!(sink.for_key(&a.key).len(), 2);
        assert_eq!(sink.count_reason("ReconcileError"), 2);
        assert_eq!(sink.for_key(&b.key)[0].severity, Severity::Normal);

        sink.clear();
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let record = ManagedRecord::new(RecordKey::new("ns", "a"), json!({}));
        TracingDiagnosticSink::new().emit(&record, Severity::Warning, "CleanupError", "failed");
    }
}
