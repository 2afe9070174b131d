//! Diagnostic severities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Routine operational information.
    Normal,

    /// Something went wrong and may need attention.
    Warning,
}

impl Severity {
    /// Get the name of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
