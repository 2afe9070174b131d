//! Lifecycle states of a managed record.
//!
//! The state of a record present in the store is fully determined by two
//! fields: whether the deletion marker is set, and whether this controller's
//! guard token is present. A record missing from the store is handled by the
//! caller before classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::record::ManagedRecord;

/// Where a present record sits in its lifecycle, from one controller's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Marker unset, guard token absent. The token must be added before
    /// anything is provisioned.
    ActiveUnguarded,

    /// Marker unset, guard token present. Converge.
    ActiveGuarded,

    /// Marker set, guard token present. Tear down, then release the token.
    PendingDeleteGuarded,

    /// Marker set, guard token absent. Nothing left to do; the store
    /// removes the record once every other owner releases its token.
    PendingDeleteUnguarded,
}

impl LifecycleState {
    /// Classify a record against the given guard token.
    pub fn classify(record: &ManagedRecord, guard_token: &str) -> Self {
        match (record.is_marked_for_deletion(), record.has_guard_token(guard_token)) {
            (false, false) => Self::ActiveUnguarded,
            (false, true) => Self::ActiveGuarded,
            (true, true) => Self::PendingDeleteGuarded,
            (true, false) => Self::PendingDeleteUnguarded,
        }
    }

    /// Whether removal has been requested.
    pub fn is_pending_delete(&self) -> bool {
        matches!(
            self,
            Self::PendingDeleteGuarded | Self::PendingDeleteUnguarded
        )
    }

    /// Get the name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveUnguarded => "active-unguarded",
            Self::ActiveGuarded => "active-guarded",
            Self::PendingDeleteGuarded => "pending-delete-guarded",
            Self::PendingDeleteUnguarded => "pending-delete-unguarded",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
