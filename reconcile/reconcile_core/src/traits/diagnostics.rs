//! Diagnostic sink contract.

use crate::types::{ManagedRecord, Severity};

/// Accepts human-visible diagnostics attached to a record.
///
/// Emitting is fire-and-forget and never affects control flow.
pub trait DiagnosticSink: Send + Sync {
    /// Attach a diagnostic to `record`.
    fn emit(&self, record: &ManagedRecord, severity: Severity, reason: &str, message: &str);
}
