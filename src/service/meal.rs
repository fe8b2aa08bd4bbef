use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::collection::{Collection, MergeSummary};
use super::{has_followups, queued_status, ServiceError, SyncedCollection};
use crate::image::ImageCompressor;
use crate::models::{
    Entity, EntityKind, Meal, MealId, MemberId, MutationKind, PendingMutation, SyncStatus,
};
use crate::remote::{ImageRef, MealDto, RemoteError, RemoteGateway};
use crate::store::{LocalStore, Resource};

/// Owns the meal collection and its round trips to the server.
pub struct MealService {
    store: Arc<LocalStore>,
    gateway: Arc<RemoteGateway>,
    compressor: Arc<dyn ImageCompressor>,
    meals: Collection<Meal>,
}

impl MealService {
    pub fn new(
        store: Arc<LocalStore>,
        gateway: Arc<RemoteGateway>,
        compressor: Arc<dyn ImageCompressor>,
    ) -> Self {
        let meals = Collection::new(store.clone(), Resource::Meals);
        Self {
            store,
            gateway,
            compressor,
            meals,
        }
    }

    pub fn meals(&self) -> Vec<Meal> {
        self.meals.snapshot()
    }

    pub fn get(&self, id: MealId) -> Option<Meal> {
        self.meals.get(id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Meal>> {
        self.meals.subscribe()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.meals.loading()
    }

    /// Waits until every change so far has reached disk.
    pub async fn flush(&self) {
        self.meals.flush().await;
    }

    /// Publishes the cached collection. A missing or unreadable cache leaves
    /// the collection empty.
    pub async fn load_from_cache(&self) {
        self.meals.set_loading(true);

        match self.store.load::<Meal>(Resource::Meals).await {
            Ok(mut meals) => {
                // Images of unsent meals only live in the blob store.
                for meal in meals
                    .iter_mut()
                    .filter(|m| m.sync_status == SyncStatus::PendingCreate)
                {
                    match self.store.load_blob(&blob_key(meal.id)).await {
                        Ok(data) => meal.image_data = data,
                        Err(e) => warn!(meal_id = %meal.id, error = %e, "Failed to load image blob"),
                    }
                }
                info!(count = meals.len(), "Loaded meals from cache");
                self.meals.replace_cached(meals);
            }
            Err(e) => warn!(error = %e, "Failed to load cached meals"),
        }

        self.meals.set_loading(false);
    }

    /// Creates a meal, optionally with an image to upload.
    ///
    /// The meal is visible locally right away. When the server cannot be
    /// reached the create is queued and the meal stays `PendingCreate`; any
    /// other failure removes it again and is returned.
    pub async fn create(
        &self,
        mut meal: Meal,
        image: Option<Vec<u8>>,
    ) -> Result<Meal, ServiceError> {
        meal.mark(SyncStatus::PendingCreate);
        if image.is_some() {
            meal.image_data = image;
        }
        self.meals.upsert(meal.clone());

        let blob = match &meal.image_data {
            Some(data) => {
                let key = blob_key(meal.id);
                if let Err(e) = self.store.save_blob(&key, data).await {
                    self.meals.remove(meal.id);
                    return Err(e.into());
                }
                Some(key)
            }
            None => None,
        };

        match self.push_create(MealDto::from(&meal), meal.image_data.as_deref()).await {
            Ok(created) => {
                self.meals.upsert(created.clone());
                if let Some(key) = &blob {
                    self.discard_blob(key).await;
                }
                info!(meal_id = %created.id, name = %created.name, "Created meal");
                Ok(created)
            }
            Err(e) if e.is_network() => {
                if let Err(queue_err) = self.enqueue(MutationKind::Create, &meal, blob.clone()).await {
                    self.meals.remove(meal.id);
                    if let Some(key) = &blob {
                        self.discard_blob(key).await;
                    }
                    return Err(queue_err);
                }
                Ok(meal)
            }
            Err(e) => {
                warn!(meal_id = %meal.id, error = %e, "Server rejected meal, rolling back");
                self.meals.remove(meal.id);
                if let Some(key) = &blob {
                    self.discard_blob(key).await;
                }
                Err(e.into())
            }
        }
    }

    /// Replaces a meal's fields.
    pub async fn update(&self, mut meal: Meal) -> Result<Meal, ServiceError> {
        let previous = self.require_editable(meal.id)?;
        if meal.image_data.is_none() {
            meal.image_data = previous.image_data.clone();
        }

        if !previous.sync_status.is_synced() {
            return self.queue_behind(previous.sync_status, meal).await;
        }

        meal.mark(SyncStatus::PendingUpdate);
        self.meals.upsert(meal.clone());
        let result = self.gateway.update_meal(&MealDto::from(&meal)).await;
        self.settle_update(previous, meal, result).await
    }

    /// Removes a meal. A meal the server has never seen is dropped locally
    /// together with its queued mutations.
    pub async fn delete(&self, id: MealId) -> Result<(), ServiceError> {
        let previous = self.require(id)?;

        if previous.sync_status == SyncStatus::PendingCreate {
            let discarded = self.store.discard_mutations_for(id.as_uuid()).await?;
            self.meals.remove(id);
            self.discard_blob(&blob_key(id)).await;
            info!(meal_id = %id, discarded, "Deleted unsent meal");
            return Ok(());
        }

        let mut meal = previous.clone();
        meal.mark(SyncStatus::PendingDelete);
        self.meals.upsert(meal.clone());

        if previous.sync_status != SyncStatus::Synced {
            self.enqueue(MutationKind::Delete, &meal, None).await?;
            return Ok(());
        }

        match self.gateway.delete_meal(id).await {
            Ok(()) => {
                self.meals.remove(id);
                info!(meal_id = %id, "Deleted meal");
                Ok(())
            }
            Err(e) if e.is_network() => {
                self.enqueue(MutationKind::Delete, &meal, None).await?;
                Ok(())
            }
            Err(e) => {
                warn!(meal_id = %id, error = %e, "Server rejected delete, restoring meal");
                self.meals.upsert(previous);
                Err(e.into())
            }
        }
    }

    /// Records that the given family members ate a meal now.
    pub async fn record_eaten(
        &self,
        id: MealId,
        members: &[MemberId],
    ) -> Result<Meal, ServiceError> {
        let previous = self.require_editable(id)?;
        let mut meal = previous.clone();
        meal.record_eaten(members, Utc::now());

        if !previous.sync_status.is_synced() {
            return self.queue_behind(previous.sync_status, meal).await;
        }

        meal.mark(SyncStatus::PendingUpdate);
        self.meals.upsert(meal.clone());
        let result = self.gateway.record_eaten(id, members).await;
        self.settle_update(previous, meal, result).await
    }

    pub async fn fetch_from_remote(&self) -> Result<Vec<Meal>, ServiceError> {
        let meals = self.gateway.list_meals().await?;
        Ok(meals.into_iter().map(MealDto::into_meal).collect())
    }

    pub fn merge_remote(&self, remote: Vec<Meal>) -> MergeSummary {
        self.meals.merge_remote(remote)
    }

    async fn push_create(
        &self,
        mut dto: MealDto,
        image: Option<&[u8]>,
    ) -> Result<Meal, RemoteError> {
        let uploaded = match image {
            Some(raw) => {
                let image = self.upload(dto.id.to_string(), raw).await?;
                dto.image_url = Some(image.url.clone());
                Some(image)
            }
            None => None,
        };

        match self.gateway.create_meal(&dto).await {
            Ok(created) => Ok(created.into_meal()),
            Err(e) => {
                // A queued create uploads its blob again on replay.
                if let Some(image) = uploaded {
                    self.discard_upload(&image).await;
                }
                Err(e)
            }
        }
    }

    async fn upload(&self, name: String, raw: &[u8]) -> Result<ImageRef, RemoteError> {
        let bytes = self.compressor.compress(raw);
        let file_name = format!("{}.{}", name, self.compressor.extension());
        debug!(file_name = %file_name, size = bytes.len(), "Uploading image");
        self.gateway.upload_image(bytes, &file_name).await
    }

    async fn settle_update(
        &self,
        previous: Meal,
        optimistic: Meal,
        result: Result<MealDto, RemoteError>,
    ) -> Result<Meal, ServiceError> {
        match result {
            Ok(dto) => {
                let updated = dto.into_meal();
                self.meals.upsert(updated.clone());
                Ok(updated)
            }
            Err(e) if e.is_network() => {
                self.enqueue(MutationKind::Update, &optimistic, None).await?;
                Ok(optimistic)
            }
            Err(e) => {
                warn!(meal_id = %previous.id, error = %e, "Server rejected update, restoring meal");
                self.meals.upsert(previous);
                Err(e.into())
            }
        }
    }

    /// Queues an update behind mutations already waiting for this meal.
    async fn queue_behind(
        &self,
        current: SyncStatus,
        mut meal: Meal,
    ) -> Result<Meal, ServiceError> {
        meal.mark(queued_status(current, MutationKind::Update));
        self.meals.upsert(meal.clone());
        self.enqueue(MutationKind::Update, &meal, None).await?;
        Ok(meal)
    }

    async fn enqueue(
        &self,
        kind: MutationKind,
        meal: &Meal,
        blob: Option<String>,
    ) -> Result<(), ServiceError> {
        let snapshot = serde_json::to_value(MealDto::from(meal))
            .map_err(|e| ServiceError::Snapshot(e.to_string()))?;
        let mut mutation = PendingMutation::new(kind, EntityKind::Meal, meal.id.as_uuid(), snapshot);
        if let Some(key) = blob {
            mutation = mutation.with_blob(key);
        }

        let queued = self.store.enqueue(mutation).await?;
        info!(meal_id = %meal.id, %kind, queued, "Server unreachable, mutation queued");
        Ok(())
    }

    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.store.delete_blob(key).await {
            warn!(key, error = %e, "Failed to delete image blob");
        }
    }

    async fn discard_upload(&self, image: &ImageRef) {
        if let Err(e) = self.gateway.delete_image(&image.key).await {
            warn!(key = %image.key, error = %e, "Failed to delete orphaned image");
        }
    }

    /// Records the server's image on a meal whose create went through while
    /// later changes are still queued.
    fn attach_remote_image(&self, id: MealId, url: String) {
        self.meals.update(id, |m| {
            m.attach_remote_image(url);
            if m.sync_status == SyncStatus::PendingCreate {
                m.sync_status = SyncStatus::PendingUpdate;
            }
        });
    }

    fn require(&self, id: MealId) -> Result<Meal, ServiceError> {
        self.meals
            .get(id)
            .ok_or_else(|| ServiceError::not_found(EntityKind::Meal, id))
    }

    /// Like `require`, but refuses a meal whose delete is already queued.
    fn require_editable(&self, id: MealId) -> Result<Meal, ServiceError> {
        let meal = self.require(id)?;
        if meal.sync_status == SyncStatus::PendingDelete {
            return Err(ServiceError::deleting(EntityKind::Meal, id));
        }
        Ok(meal)
    }

    async fn followups(&self, mutation: &PendingMutation) -> Result<bool, ServiceError> {
        let queue = self.store.pending_mutations().await?;
        Ok(has_followups(&queue, mutation))
    }
}

#[async_trait]
impl SyncedCollection for MealService {
    fn kind(&self) -> EntityKind {
        EntityKind::Meal
    }

    async fn replay(&self, mutation: &PendingMutation) -> Result<(), ServiceError> {
        let dto: MealDto = serde_json::from_value(mutation.snapshot.clone())
            .map_err(|e| ServiceError::Snapshot(e.to_string()))?;
        let id = MealId::from_uuid(mutation.entity_id);

        let canonical = match mutation.kind {
            MutationKind::Create => {
                let image = match &mutation.blob_key {
                    Some(key) => {
                        let image = self.store.load_blob(key).await?;
                        if image.is_none() {
                            warn!(meal_id = %id, key = %key, "Image blob missing, creating meal without it");
                        }
                        image
                    }
                    None => None,
                };
                let created = self.push_create(dto, image.as_deref()).await?;
                if let Some(key) = &mutation.blob_key {
                    self.discard_blob(key).await;
                }
                Some(created)
            }
            MutationKind::Update => {
                let mut dto = dto;
                // Queued behind an offline create, the snapshot predates the upload.
                if dto.image_url.is_none() {
                    dto.image_url = self.meals.get(id).and_then(|m| m.image_url);
                }
                Some(self.gateway.update_meal(&dto).await?.into_meal())
            }
            MutationKind::Delete => {
                match self.gateway.delete_meal(id).await {
                    Ok(()) | Err(RemoteError::NotFound) => {}
                    Err(e) => return Err(e.into()),
                }
                self.meals.remove(id);
                None
            }
        };

        if let Some(meal) = canonical {
            if !self.followups(mutation).await? {
                self.meals.upsert(meal);
            } else if let Some(url) = meal.image_url {
                // Later queued changes keep the local copy pending.
                self.attach_remote_image(id, url);
            }
        }
        Ok(())
    }

    async fn abandon(&self, mutation: &PendingMutation) {
        let id = MealId::from_uuid(mutation.entity_id);

        match mutation.kind {
            MutationKind::Create => {
                self.meals.remove(id);
                if let Some(key) = &mutation.blob_key {
                    self.discard_blob(key).await;
                }
            }
            MutationKind::Update | MutationKind::Delete => match self.followups(mutation).await {
                Ok(false) => {
                    self.meals.update(id, |m| m.sync_status = SyncStatus::Synced);
                }
                Ok(true) => {}
                Err(e) => warn!(meal_id = %id, error = %e, "Failed to read pending queue"),
            },
        }
    }

    async fn refresh(&self) -> Result<MergeSummary, ServiceError> {
        let remote = self.fetch_from_remote().await?;
        let summary = self.merge_remote(remote);
        debug!(?summary, "Merged remote meals");
        Ok(summary)
    }
}

/// Blob store key holding a meal's not-yet-uploaded image.
pub(crate) fn blob_key(id: MealId) -> String {
    id.to_string()
}
