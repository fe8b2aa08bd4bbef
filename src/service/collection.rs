//! The observable in-memory projection of one entity collection.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

use crate::models::{Entity, SyncStatus};
use crate::store::{CollectionWriter, LocalStore, Resource};

/// Counts produced by a remote-wins merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Entities taken from the server.
    pub remote: usize,
    /// Local-only entities kept because they carry unacknowledged mutations.
    pub kept_local: usize,
    /// Local-only synced entities dropped as remotely deleted.
    pub dropped: usize,
}

/// Remote-wins merge.
///
/// The result is every remote entity (marked synced) followed by the local
/// entities the server does not know about and that are not synced.
pub fn merge<T: Entity>(local: Vec<T>, remote: Vec<T>) -> (Vec<T>, MergeSummary) {
    let remote_ids: HashSet<T::Id> = remote.iter().map(Entity::id).collect();

    let mut merged: Vec<T> = remote
        .into_iter()
        .map(|mut entity| {
            entity.set_sync_status(SyncStatus::Synced);
            entity
        })
        .collect();
    let mut summary = MergeSummary {
        remote: merged.len(),
        ..MergeSummary::default()
    };

    for entity in local {
        if remote_ids.contains(&entity.id()) {
            continue;
        }
        if entity.sync_status().is_synced() {
            summary.dropped += 1;
        } else {
            summary.kept_local += 1;
            merged.push(entity);
        }
    }

    (merged, summary)
}

/// In-memory collection published through a watch channel.
///
/// Every change is handed to the collection's background writer while the
/// channel's write lock is held, so disk writes follow the order of changes.
pub(crate) struct Collection<T: Entity> {
    items: watch::Sender<Vec<T>>,
    loading: watch::Sender<bool>,
    writer: CollectionWriter,
}

impl<T: Entity> Collection<T> {
    pub fn new(store: Arc<LocalStore>, resource: Resource) -> Self {
        let (items, _) = watch::channel(Vec::new());
        let (loading, _) = watch::channel(false);

        Self {
            items,
            loading,
            writer: CollectionWriter::spawn(store, resource),
        }
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    pub fn get(&self, id: T::Id) -> Option<T> {
        self.items.borrow().iter().find(|e| e.id() == id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.items.subscribe()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }

    /// Publishes a collection read from disk without writing it back.
    pub fn replace_cached(&self, items: Vec<T>) {
        self.items.send_replace(items);
    }

    /// Replaces the entity with the same id, or appends it.
    pub fn upsert(&self, entity: T) {
        self.modify(|items| match items.iter_mut().find(|e| e.id() == entity.id()) {
            Some(slot) => *slot = entity,
            None => items.push(entity),
        });
    }

    pub fn remove(&self, id: T::Id) -> Option<T> {
        let mut removed = None;
        self.modify(|items| {
            if let Some(pos) = items.iter().position(|e| e.id() == id) {
                removed = Some(items.remove(pos));
            }
        });
        removed
    }

    /// Applies `change` to the entity with `id` and returns the result.
    pub fn update<F>(&self, id: T::Id, change: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut updated = None;
        self.modify(|items| {
            if let Some(entity) = items.iter_mut().find(|e| e.id() == id) {
                change(entity);
                updated = Some(entity.clone());
            }
        });
        updated
    }

    pub fn merge_remote(&self, remote: Vec<T>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        self.modify(|items| {
            let local = std::mem::take(items);
            let (merged, counts) = merge(local, remote);
            *items = merged;
            summary = counts;
        });
        summary
    }

    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    fn modify<F>(&self, change: F)
    where
        F: FnOnce(&mut Vec<T>),
    {
        self.items.send_modify(|items| {
            change(items);
            self.writer.submit(items);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meal, PrepTime};
    use tempfile::TempDir;

    fn meal(name: &str, status: SyncStatus) -> Meal {
        let mut meal = Meal::new(name, "Any", PrepTime::Short);
        meal.sync_status = status;
        meal
    }

    #[test]
    fn test_merge_law() {
        let shared = meal("Shared", SyncStatus::PendingUpdate);
        let pending = meal("Pending", SyncStatus::PendingCreate);
        let stale = meal("Stale", SyncStatus::Synced);

        let mut remote_shared = shared.clone();
        remote_shared.name = "Shared (server)".to_string();
        let remote_only = meal("Remote only", SyncStatus::PendingDelete);

        let (merged, summary) = merge(
            vec![shared.clone(), pending.clone(), stale.clone()],
            vec![remote_shared.clone(), remote_only.clone()],
        );

        assert_eq!(
            summary,
            MergeSummary {
                remote: 2,
                kept_local: 1,
                dropped: 1
            }
        );
        assert_eq!(merged.len(), 3);

        let by_id = |id| merged.iter().find(|m| m.id == id).unwrap();
        assert_eq!(by_id(shared.id).name, "Shared (server)");
        assert_eq!(by_id(shared.id).sync_status, SyncStatus::Synced);
        assert_eq!(by_id(remote_only.id).sync_status, SyncStatus::Synced);
        assert_eq!(by_id(pending.id).sync_status, SyncStatus::PendingCreate);
        assert!(merged.iter().all(|m| m.id != stale.id));
    }

    #[test]
    fn test_merge_with_empty_remote_keeps_only_pending() {
        let (merged, summary) = merge(
            vec![
                meal("A", SyncStatus::Synced),
                meal("B", SyncStatus::PendingDelete),
            ],
            Vec::new(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "B");
        assert_eq!(summary.dropped, 1);
    }

    #[tokio::test]
    async fn test_collection_changes_are_published_and_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(temp_dir.path().to_path_buf()));
        let collection: Collection<Meal> = Collection::new(store.clone(), Resource::Meals);
        let mut rx = collection.subscribe();

        let first = meal("First", SyncStatus::PendingCreate);
        collection.upsert(first.clone());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        let updated = collection
            .update(first.id, |m| m.name = "Renamed".to_string())
            .unwrap();
        assert_eq!(updated.name, "Renamed");

        collection.upsert(meal("Second", SyncStatus::Synced));
        assert_eq!(collection.remove(first.id).unwrap().name, "Renamed");
        assert!(collection.remove(first.id).is_none());

        collection.flush().await;
        let stored: Vec<Meal> = store.load(Resource::Meals).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Second");
    }
}
