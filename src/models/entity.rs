use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

use super::{EntityKind, SyncStatus};

/// Common surface of the records an entity service owns.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    fn sync_status(&self) -> SyncStatus;

    fn set_sync_status(&mut self, status: SyncStatus);

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Marks a local mutation: new status plus a fresh modification time.
    fn mark(&mut self, status: SyncStatus) {
        self.set_sync_status(status);
        self.set_updated_at(Utc::now());
    }
}
