//! Ordered background persistence for one collection.
//!
//! Optimistic mutations hand the encoded collection to the writer and return
//! immediately. A single task per collection drains the channel, so writes hit
//! disk in submission order and never interleave.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use super::{encode, LocalStore, Resource};

enum Command {
    Write(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer of a single resource.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct CollectionWriter {
    resource: Resource,
    tx: mpsc::UnboundedSender<Command>,
}

impl CollectionWriter {
    pub fn spawn(store: Arc<LocalStore>, resource: Resource) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Write(bytes) => {
                        if let Err(e) = store.save_raw(resource, &bytes).await {
                            error!(?resource, error = %e, "Background write failed");
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { resource, tx }
    }

    /// Queues a full overwrite of the collection.
    pub fn submit<T: Serialize>(&self, items: &[T]) {
        let bytes = match encode(self.resource, items) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(resource = ?self.resource, error = %e, "Failed to encode collection");
                return;
            }
        };

        if self.tx.send(Command::Write(bytes)).is_err() {
            warn!(resource = ?self.resource, "Writer task has stopped, dropping write");
        }
    }

    /// Waits until every write submitted before this call is on disk.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}
