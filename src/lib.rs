//! Offline-first sync engine for meals and family members.
//!
//! Entity services apply every mutation locally first, then try the server.
//! When the server cannot be reached the mutation is queued on disk and the
//! [`sync::SyncCoordinator`] replays it later before merging the server's
//! collections back in.

pub mod app;
pub mod config;
pub mod image;
pub mod models;
pub mod remote;
pub mod service;
pub mod store;
pub mod sync;

pub use app::{App, AppError};
pub use config::Config;
