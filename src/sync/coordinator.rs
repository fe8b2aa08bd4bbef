use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::models::EntityKind;
use crate::remote::RemoteGateway;
use crate::service::{ServiceError, SyncedCollection};
use crate::store::LocalStore;

const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Offline,
    Error(String),
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Syncing => write!(f, "syncing"),
            SyncPhase::Offline => write!(f, "offline"),
            SyncPhase::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// What consumers observe about synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    pub phase: SyncPhase,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass held the lock; nothing was done.
    AlreadyRunning,
    Finished(SyncPhase),
}

pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    gateway: Arc<RemoteGateway>,
    collections: Vec<Arc<dyn SyncedCollection>>,
    state: watch::Sender<SyncState>,
    pass_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<LocalStore>,
        gateway: Arc<RemoteGateway>,
        collections: Vec<Arc<dyn SyncedCollection>>,
    ) -> Self {
        Self {
            store,
            gateway,
            collections,
            state: watch::Sender::new(SyncState::default()),
            pass_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Observes the number of queued mutations.
    pub fn pending(&self) -> watch::Receiver<usize> {
        self.store.watch_pending()
    }

    /// Re-reads the durable queue so `pending()` reflects it.
    pub async fn refresh_pending_count(&self) -> usize {
        match self.store.pending_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to read pending queue");
                *self.store.watch_pending().borrow()
            }
        }
    }

    /// Publishes the completion time of the last pass made by any process.
    pub async fn restore_last_synced(&self) -> Option<DateTime<Utc>> {
        match self.store.last_synced_at().await {
            Ok(Some(at)) => {
                self.state.send_if_modified(|state| match state.last_synced_at {
                    Some(current) if current >= at => false,
                    _ => {
                        state.last_synced_at = Some(at);
                        true
                    }
                });
                Some(at)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read last sync time");
                None
            }
        }
    }

    /// Runs one pass. Returns immediately if a pass is already running.
    pub async fn sync_pending(&self) -> PassOutcome {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            debug!("Sync pass already running");
            return PassOutcome::AlreadyRunning;
        };
        PassOutcome::Finished(self.run_pass().await)
    }

    /// Probes the server first and only runs a pass when it answers.
    pub async fn sync_if_reachable(&self) -> PassOutcome {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            debug!("Sync pass already running");
            return PassOutcome::AlreadyRunning;
        };

        if !self.gateway.is_reachable().await {
            info!("Server unreachable, skipping sync");
            self.set_phase(SyncPhase::Offline);
            return PassOutcome::Finished(SyncPhase::Offline);
        }
        PassOutcome::Finished(self.run_pass().await)
    }

    /// Runs reachability-gated passes every `every` (at least one second)
    /// until the handle is aborted.
    pub fn spawn_periodic(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let every = every.max(MIN_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let outcome = coordinator.sync_if_reachable().await;
                debug!(?outcome, "Periodic sync finished");
            }
        })
    }

    async fn run_pass(&self) -> SyncPhase {
        self.set_phase(SyncPhase::Syncing);

        let phase = match self.drain_and_refresh().await {
            Ok(()) => {
                let now = Utc::now();
                self.state.send_modify(|state| state.last_synced_at = Some(now));
                if let Err(e) = self.store.record_sync(now).await {
                    warn!(error = %e, "Failed to record sync time");
                }
                info!("Sync pass complete");
                SyncPhase::Idle
            }
            Err(e) if e.is_network() => {
                info!(error = %e, "Server unreachable, sync pass stopped");
                SyncPhase::Offline
            }
            Err(e) => {
                warn!(error = %e, "Sync pass failed");
                SyncPhase::Error(e.to_string())
            }
        };

        self.set_phase(phase.clone());
        phase
    }

    async fn drain_and_refresh(&self) -> Result<(), ServiceError> {
        let replayed = self.drain().await?;
        debug!(replayed, "Pending queue drained");

        for collection in &self.collections {
            let summary = collection.refresh().await?;
            info!(
                kind = %collection.kind(),
                remote = summary.remote,
                kept_local = summary.kept_local,
                dropped = summary.dropped,
                "Merged remote collection"
            );
        }
        Ok(())
    }

    /// Replays queued mutations oldest first. Stops at the first network
    /// failure, leaving that mutation and everything after it queued.
    async fn drain(&self) -> Result<usize, ServiceError> {
        let queue = self.store.pending_mutations().await?;
        let mut replayed = 0;

        for mutation in queue {
            match self.collection(mutation.entity) {
                Some(collection) => match collection.replay(&mutation).await {
                    Ok(()) => {
                        debug!(%mutation, "Replayed mutation");
                        replayed += 1;
                    }
                    Err(e) if e.is_network() => return Err(e),
                    Err(e) => {
                        warn!(%mutation, error = %e, "Server refused queued mutation, dropping it");
                        collection.abandon(&mutation).await;
                    }
                },
                None => warn!(%mutation, "No collection handles queued mutation, dropping it"),
            }

            let remaining = self.store.remove_mutation(mutation.id).await?;
            debug!(remaining, "Pending queue shrank");
        }

        Ok(replayed)
    }

    fn collection(&self, kind: EntityKind) -> Option<&Arc<dyn SyncedCollection>> {
        self.collections.iter().find(|c| c.kind() == kind)
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.state.send_modify(|state| state.phase = phase);
    }
}
