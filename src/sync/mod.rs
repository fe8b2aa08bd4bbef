//! Full synchronization passes.
//!
//! A pass drains the pending-mutation queue in creation order and then
//! fetches both collections from the server and merges them remote-wins.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = Arc::new(SyncCoordinator::new(store, gateway, vec![meals, members]));
//! let handle = coordinator.spawn_periodic(Duration::from_secs(300));
//! let outcome = coordinator.sync_pending().await;
//! ```

mod coordinator;

pub use coordinator::{PassOutcome, SyncCoordinator, SyncPhase, SyncState};
