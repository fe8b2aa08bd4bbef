//! Durable local state: entity collections, the pending-mutation queue and
//! not-yet-uploaded image blobs.
//!
//! Storage layout:
//! ```text
//! <data_dir>/
//! ├── meals.json
//! ├── family_members.json
//! ├── pending_mutations.json
//! ├── sync_state.json
//! └── blobs/
//!     └── <meal-id>.bin
//! ```
//!
//! Every write replaces the whole document. Data goes to a `.tmp` sibling,
//! is synced to disk and is then renamed over the target, so a reader sees
//! either the old or the new document, never a torn one.

mod writer;

pub use writer::CollectionWriter;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::models::PendingMutation;

const BLOB_DIR: &str = "blobs";
const BLOB_EXTENSION: &str = "bin";

/// The logical documents kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Meals,
    FamilyMembers,
    PendingMutations,
    SyncState,
}

impl Resource {
    pub fn filename(&self) -> &'static str {
        match self {
            Resource::Meals => "meals.json",
            Resource::FamilyMembers => "family_members.json",
            Resource::PendingMutations => "pending_mutations.json",
            Resource::SyncState => "sync_state.json",
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {resource:?}: {source}")]
    Encode {
        resource: Resource,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SyncMarker {
    last_synced_at: DateTime<Utc>,
}

/// File-backed store rooted at a data directory.
#[derive(Debug)]
pub struct LocalStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles on the pending queue.
    queue_lock: Mutex<()>,
    /// Last known queue length, republished on every queue read or write.
    pending: watch::Sender<usize>,
}

impl LocalStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            queue_lock: Mutex::new(()),
            pending: watch::Sender::new(0),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self, resource: Resource) -> PathBuf {
        self.data_dir.join(resource.filename())
    }

    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(BLOB_DIR)
            .join(format!("{}.{}", key, BLOB_EXTENSION))
    }

    /// Reads a whole collection. A missing document is an empty collection.
    pub async fn load<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Vec<T>, StorageError> {
        let path = self.path(resource);

        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| StorageError::Decode { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Overwrites a whole collection.
    pub async fn save<T: Serialize>(
        &self,
        resource: Resource,
        items: &[T],
    ) -> Result<(), StorageError> {
        let bytes = encode(resource, items)?;
        self.save_raw(resource, &bytes).await
    }

    /// Overwrites a document with already-encoded JSON.
    pub async fn save_raw(&self, resource: Resource, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(resource);
        write_atomic(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved document");
        Ok(())
    }

    // ========== Pending queue ==========

    /// Returns queued mutations in creation order.
    pub async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StorageError> {
        let _guard = self.queue_lock.lock().await;
        let queue: Vec<PendingMutation> = self.load(Resource::PendingMutations).await?;
        self.pending.send_replace(queue.len());
        Ok(queue)
    }

    /// Observes the pending queue length.
    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    pub async fn pending_count(&self) -> Result<usize, StorageError> {
        Ok(self.pending_mutations().await?.len())
    }

    /// Appends a mutation and returns the new queue length.
    pub async fn enqueue(&self, mutation: PendingMutation) -> Result<usize, StorageError> {
        let _guard = self.queue_lock.lock().await;
        let mut queue: Vec<PendingMutation> = self.load(Resource::PendingMutations).await?;
        queue.push(mutation);
        self.save(Resource::PendingMutations, &queue).await?;
        self.pending.send_replace(queue.len());
        Ok(queue.len())
    }

    /// Removes one mutation by id and returns the new queue length.
    pub async fn remove_mutation(&self, id: Uuid) -> Result<usize, StorageError> {
        self.retain_mutations(|m| m.id != id).await
    }

    /// Drops every queued mutation aimed at `entity_id`.
    pub async fn discard_mutations_for(&self, entity_id: Uuid) -> Result<usize, StorageError> {
        self.retain_mutations(|m| m.entity_id != entity_id).await
    }

    async fn retain_mutations<F>(&self, keep: F) -> Result<usize, StorageError>
    where
        F: Fn(&PendingMutation) -> bool,
    {
        let _guard = self.queue_lock.lock().await;
        let mut queue: Vec<PendingMutation> = self.load(Resource::PendingMutations).await?;
        let before = queue.len();
        queue.retain(|m| keep(m));
        if queue.len() != before {
            self.save(Resource::PendingMutations, &queue).await?;
        }
        self.pending.send_replace(queue.len());
        Ok(queue.len())
    }

    // ========== Sync state ==========

    /// When the last sync pass completed, if one ever did.
    pub async fn last_synced_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let path = self.path(Resource::SyncState);

        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<SyncMarker>(&bytes)
                .map(|marker| Some(marker.last_synced_at))
                .map_err(|source| StorageError::Decode { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    pub async fn record_sync(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
        let marker = SyncMarker { last_synced_at: at };
        let bytes = serde_json::to_vec_pretty(&marker).map_err(|source| StorageError::Encode {
            resource: Resource::SyncState,
            source,
        })?;
        self.save_raw(Resource::SyncState, &bytes).await
    }

    // ========== Blobs ==========

    pub async fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        write_atomic(&self.blob_path(key), bytes).await
    }

    /// Returns `Ok(None)` if no blob is stored under `key`.
    pub async fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.blob_path(key);

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Returns `Ok(true)` if a blob was deleted, `Ok(false)` if there was none.
    pub async fn delete_blob(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    pub async fn has_blob(&self, key: &str) -> bool {
        fs::try_exists(self.blob_path(key)).await.unwrap_or(false)
    }
}

pub(crate) fn encode<T: Serialize>(
    resource: Resource,
    items: &[T],
) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(items).map_err(|source| StorageError::Encode { resource, source })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    Ok(())
}
