//! Composition root: wires the store, gateway, services and coordinator.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::image::{ImageCompressor, Passthrough};
use crate::remote::{HttpTransport, RemoteError, RemoteGateway, Transport};
use crate::service::{FamilyMemberService, MealService, SyncedCollection};
use crate::store::LocalStore;
use crate::sync::SyncCoordinator;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Remote service not configured. Set remote.base_url and remote.token in the config file, or MEALSYNC_BASE_URL and MEALSYNC_TOKEN")]
    NotConfigured,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct App {
    pub store: Arc<LocalStore>,
    pub gateway: Arc<RemoteGateway>,
    pub meals: Arc<MealService>,
    pub members: Arc<FamilyMemberService>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl App {
    /// Builds the engine against the configured HTTP server.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let (Some(base_url), Some(token)) = (&config.remote.base_url.value, &config.remote.token.value)
        else {
            return Err(AppError::NotConfigured);
        };

        let transport = HttpTransport::new(
            base_url.as_str(),
            token,
            config.remote.timeout(),
            config.remote.probe_timeout(),
        )?;
        Ok(Self::with_transport(
            config.data_dir.value.clone(),
            Arc::new(transport),
        ))
    }

    pub fn with_transport(data_dir: PathBuf, transport: Arc<dyn Transport>) -> Self {
        Self::with_compressor(data_dir, transport, Arc::new(Passthrough))
    }

    pub fn with_compressor(
        data_dir: PathBuf,
        transport: Arc<dyn Transport>,
        compressor: Arc<dyn ImageCompressor>,
    ) -> Self {
        let store = Arc::new(LocalStore::new(data_dir));
        let gateway = Arc::new(RemoteGateway::new(transport));
        let meals = Arc::new(MealService::new(store.clone(), gateway.clone(), compressor));
        let members = Arc::new(FamilyMemberService::new(store.clone(), gateway.clone()));

        let collections: Vec<Arc<dyn SyncedCollection>> = vec![meals.clone(), members.clone()];
        let coordinator = Arc::new(SyncCoordinator::new(store.clone(), gateway.clone(), collections));

        Self {
            store,
            gateway,
            meals,
            members,
            coordinator,
        }
    }

    /// Loads both cached collections and publishes the pending count.
    pub async fn launch(&self) -> usize {
        tokio::join!(self.meals.load_from_cache(), self.members.load_from_cache());
        let pending = self.coordinator.refresh_pending_count().await;
        self.coordinator.restore_last_synced().await;
        info!(
            data_dir = %self.store.data_dir().display(),
            pending,
            "Local state loaded"
        );
        pending
    }

    /// Waits for queued collection writes to reach disk.
    pub async fn shutdown(&self) {
        tokio::join!(self.meals.flush(), self.members.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, ConfigValue};
    use crate::models::{FamilyMember, Meal, PrepTime};
    use crate::remote::fake::FakeServer;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_requires_remote() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("missing.yaml"))).unwrap();
        config.remote.base_url = ConfigValue::new(None, ConfigSource::Default);
        config.remote.token = ConfigValue::new(None, ConfigSource::Default);

        assert!(matches!(App::from_config(&config), Err(AppError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_launch_restores_previous_session() {
        let temp_dir = TempDir::new().unwrap();
        let server = Arc::new(FakeServer::new());
        server.set_offline(true);

        {
            let app = App::with_transport(temp_dir.path().to_path_buf(), server.clone());
            app.launch().await;
            app.meals
                .create(Meal::new("Pasta", "Italian", PrepTime::Medium), None)
                .await
                .unwrap();
            app.members
                .create(FamilyMember::new("Ada", "parent", 38))
                .await
                .unwrap();
            app.shutdown().await;
        }

        let app = App::with_transport(temp_dir.path().to_path_buf(), server.clone());
        assert_eq!(app.launch().await, 2);
        assert_eq!(app.meals.meals().len(), 1);
        assert_eq!(app.members.members().len(), 1);
        assert_eq!(*app.coordinator.pending().borrow(), 2);
    }

    #[tokio::test]
    async fn test_launch_restores_last_sync_time() {
        let temp_dir = TempDir::new().unwrap();
        let server = Arc::new(FakeServer::new());

        let first = App::with_transport(temp_dir.path().to_path_buf(), server.clone());
        first.launch().await;
        first.coordinator.sync_pending().await;
        let synced_at = first.coordinator.state().last_synced_at;
        assert!(synced_at.is_some());
        first.shutdown().await;

        let app = App::with_transport(temp_dir.path().to_path_buf(), server);
        assert!(app.coordinator.state().last_synced_at.is_none());
        app.launch().await;
        assert_eq!(app.coordinator.state().last_synced_at, synced_at);
    }
}
