use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-entity replication state.
///
/// Anything other than `Synced` means the entity carries a local mutation the
/// server has not acknowledged yet, so a matching entry sits in the pending
/// queue (or a request for it is in flight).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
}

impl SyncStatus {
    pub fn is_synced(self) -> bool {
        self == SyncStatus::Synced
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::PendingCreate => write!(f, "pending-create"),
            SyncStatus::PendingUpdate => write!(f, "pending-update"),
            SyncStatus::PendingDelete => write!(f, "pending-delete"),
        }
    }
}
