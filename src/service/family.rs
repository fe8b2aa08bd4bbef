use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::collection::{Collection, MergeSummary};
use super::{has_followups, queued_status, ServiceError, SyncedCollection};
use crate::models::{
    Entity, EntityKind, FamilyMember, MealId, MemberId, MutationKind, PendingMutation,
    SyncStatus,
};
use crate::remote::{FamilyMemberDto, RemoteError, RemoteGateway};
use crate::store::{LocalStore, Resource};

/// Owns the family member collection and its round trips to the server.
pub struct FamilyMemberService {
    store: Arc<LocalStore>,
    gateway: Arc<RemoteGateway>,
    members: Collection<FamilyMember>,
}

impl FamilyMemberService {
    pub fn new(store: Arc<LocalStore>, gateway: Arc<RemoteGateway>) -> Self {
        let members = Collection::new(store.clone(), Resource::FamilyMembers);
        Self {
            store,
            gateway,
            members,
        }
    }

    pub fn members(&self) -> Vec<FamilyMember> {
        self.members.snapshot()
    }

    pub fn get(&self, id: MemberId) -> Option<FamilyMember> {
        self.members.get(id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<FamilyMember>> {
        self.members.subscribe()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.members.loading()
    }

    pub async fn flush(&self) {
        self.members.flush().await;
    }

    pub async fn load_from_cache(&self) {
        self.members.set_loading(true);
        match self.store.load::<FamilyMember>(Resource::FamilyMembers).await {
            Ok(members) => {
                info!(count = members.len(), "Loaded family members from cache");
                self.members.replace_cached(members);
            }
            Err(e) => warn!(error = %e, "Failed to load cached family members"),
        }
        self.members.set_loading(false);
    }

    pub async fn create(&self, mut member: FamilyMember) -> Result<FamilyMember, ServiceError> {
        member.mark(SyncStatus::PendingCreate);
        self.members.upsert(member.clone());

        match self.gateway.create_member(&FamilyMemberDto::from(&member)).await {
            Ok(dto) => {
                let created = dto.into_member();
                self.members.upsert(created.clone());
                info!(member_id = %created.id, name = %created.name, "Created family member");
                Ok(created)
            }
            Err(e) if e.is_network() => {
                if let Err(queue_err) = self.enqueue(MutationKind::Create, &member).await {
                    self.members.remove(member.id);
                    return Err(queue_err);
                }
                Ok(member)
            }
            Err(e) => {
                warn!(member_id = %member.id, error = %e, "Server rejected family member, rolling back");
                self.members.remove(member.id);
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, mut member: FamilyMember) -> Result<FamilyMember, ServiceError> {
        let previous = self.require_editable(member.id)?;

        if !previous.sync_status.is_synced() {
            return self.queue_behind(previous.sync_status, member).await;
        }

        member.mark(SyncStatus::PendingUpdate);
        self.members.upsert(member.clone());

        match self.gateway.update_member(&FamilyMemberDto::from(&member)).await {
            Ok(dto) => {
                let updated = dto.into_member();
                self.members.upsert(updated.clone());
                Ok(updated)
            }
            Err(e) if e.is_network() => {
                self.enqueue(MutationKind::Update, &member).await?;
                Ok(member)
            }
            Err(e) => {
                warn!(member_id = %member.id, error = %e, "Server rejected update, restoring family member");
                self.members.upsert(previous);
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, id: MemberId) -> Result<(), ServiceError> {
        let previous = self.require(id)?;

        if previous.sync_status == SyncStatus::PendingCreate {
            let discarded = self.store.discard_mutations_for(id.as_uuid()).await?;
            self.members.remove(id);
            info!(member_id = %id, discarded, "Deleted unsent family member");
            return Ok(());
        }

        let mut member = previous.clone();
        member.mark(SyncStatus::PendingDelete);
        self.members.upsert(member.clone());

        if previous.sync_status != SyncStatus::Synced {
            return self.enqueue(MutationKind::Delete, &member).await;
        }

        match self.gateway.delete_member(id).await {
            Ok(()) => {
                self.members.remove(id);
                info!(member_id = %id, "Deleted family member");
                Ok(())
            }
            Err(e) if e.is_network() => self.enqueue(MutationKind::Delete, &member).await,
            Err(e) => {
                warn!(member_id = %id, error = %e, "Server rejected delete, restoring family member");
                self.members.upsert(previous);
                Err(e.into())
            }
        }
    }

    pub async fn add_favorite(
        &self,
        member: MemberId,
        meal: MealId,
    ) -> Result<FamilyMember, ServiceError> {
        self.change_favorite(member, meal, true).await
    }

    pub async fn remove_favorite(
        &self,
        member: MemberId,
        meal: MealId,
    ) -> Result<FamilyMember, ServiceError> {
        self.change_favorite(member, meal, false).await
    }

    pub async fn fetch_from_remote(&self) -> Result<Vec<FamilyMember>, ServiceError> {
        let members = self.gateway.list_members().await?;
        Ok(members.into_iter().map(FamilyMemberDto::into_member).collect())
    }

    pub fn merge_remote(&self, remote: Vec<FamilyMember>) -> MergeSummary {
        self.members.merge_remote(remote)
    }

    async fn change_favorite(
        &self,
        id: MemberId,
        meal: MealId,
        add: bool,
    ) -> Result<FamilyMember, ServiceError> {
        let previous = self.require_editable(id)?;
        let mut member = previous.clone();
        let changed = if add {
            member.add_favorite(meal)
        } else {
            member.remove_favorite(meal)
        };
        if !changed {
            return Ok(previous);
        }

        if !previous.sync_status.is_synced() {
            return self.queue_behind(previous.sync_status, member).await;
        }

        member.mark(SyncStatus::PendingUpdate);
        self.members.upsert(member.clone());

        let result = if add {
            self.gateway.add_favorite(id, meal).await
        } else {
            self.gateway.remove_favorite(id, meal).await
        };

        match result {
            Ok(()) => {
                member.sync_status = SyncStatus::Synced;
                self.members.upsert(member.clone());
                Ok(member)
            }
            Err(e) if e.is_network() => {
                self.enqueue(MutationKind::Update, &member).await?;
                Ok(member)
            }
            Err(e) => {
                warn!(member_id = %id, meal_id = %meal, error = %e, "Server rejected favorite change, reverting");
                self.members.upsert(previous);
                Err(e.into())
            }
        }
    }

    async fn queue_behind(
        &self,
        current: SyncStatus,
        mut member: FamilyMember,
    ) -> Result<FamilyMember, ServiceError> {
        member.mark(queued_status(current, MutationKind::Update));
        self.members.upsert(member.clone());
        self.enqueue(MutationKind::Update, &member).await?;
        Ok(member)
    }

    async fn enqueue(&self, kind: MutationKind, member: &FamilyMember) -> Result<(), ServiceError> {
        let snapshot = serde_json::to_value(FamilyMemberDto::from(member))
            .map_err(|e| ServiceError::Snapshot(e.to_string()))?;
        let mutation = PendingMutation::new(kind, EntityKind::FamilyMember, member.id.as_uuid(), snapshot);

        let queued = self.store.enqueue(mutation).await?;
        info!(member_id = %member.id, %kind, queued, "Server unreachable, mutation queued");
        Ok(())
    }

    fn require(&self, id: MemberId) -> Result<FamilyMember, ServiceError> {
        self.members
            .get(id)
            .ok_or_else(|| ServiceError::not_found(EntityKind::FamilyMember, id))
    }

    fn require_editable(&self, id: MemberId) -> Result<FamilyMember, ServiceError> {
        let member = self.require(id)?;
        if member.sync_status == SyncStatus::PendingDelete {
            return Err(ServiceError::deleting(EntityKind::FamilyMember, id));
        }
        Ok(member)
    }

    async fn followups(&self, mutation: &PendingMutation) -> Result<bool, ServiceError> {
        let queue = self.store.pending_mutations().await?;
        Ok(has_followups(&queue, mutation))
    }
}

#[async_trait]
impl SyncedCollection for FamilyMemberService {
    fn kind(&self) -> EntityKind {
        EntityKind::FamilyMember
    }

    async fn replay(&self, mutation: &PendingMutation) -> Result<(), ServiceError> {
        let dto: FamilyMemberDto = serde_json::from_value(mutation.snapshot.clone())
            .map_err(|e| ServiceError::Snapshot(e.to_string()))?;
        let id = MemberId::from_uuid(mutation.entity_id);

        let canonical = match mutation.kind {
            MutationKind::Create => self.gateway.create_member(&dto).await?,
            MutationKind::Update => self.gateway.update_member(&dto).await?,
            MutationKind::Delete => {
                match self.gateway.delete_member(id).await {
                    Ok(()) | Err(RemoteError::NotFound) => {}
                    Err(e) => return Err(e.into()),
                }
                self.members.remove(id);
                return Ok(());
            }
        };

        if !self.followups(mutation).await? {
            self.members.upsert(canonical.into_member());
        }
        Ok(())
    }

    async fn abandon(&self, mutation: &PendingMutation) {
        let id = MemberId::from_uuid(mutation.entity_id);

        match mutation.kind {
            MutationKind::Create => {
                self.members.remove(id);
            }
            MutationKind::Update | MutationKind::Delete => match self.followups(mutation).await {
                Ok(false) => {
                    self.members.update(id, |m| m.sync_status = SyncStatus::Synced);
                }
                Ok(true) => {}
                Err(e) => warn!(member_id = %id, error = %e, "Failed to read pending queue"),
            },
        }
    }

    async fn refresh(&self) -> Result<MergeSummary, ServiceError> {
        let remote = self.fetch_from_remote().await?;
        let summary = self.merge_remote(remote);
        debug!(?summary, "Merged remote family members");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rgba;
    use crate::service::testing::{harness, Harness};
    use reqwest::Method;

    fn service(h: &Harness) -> FamilyMemberService {
        FamilyMemberService::new(h.store.clone(), h.gateway.clone())
    }

    fn ada() -> FamilyMember {
        FamilyMember::new("Ada", "parent", 38)
            .with_icon("star")
            .with_colors(vec![Rgba::new(0.25, 0.5, 0.75, 1.0)])
    }

    async fn seed(
        h: &Harness,
        service: &FamilyMemberService,
        member: FamilyMember,
    ) -> FamilyMember {
        h.server.insert_member(FamilyMemberDto::from(&member));
        service.refresh().await.unwrap();
        service.get(member.id).unwrap()
    }

    #[tokio::test]
    async fn test_create_online() {
        let h = harness();
        let members = service(&h);

        let created = members.create(ada()).await.unwrap();

        assert_eq!(created.sync_status, SyncStatus::Synced);
        assert_eq!(h.server.members().len(), 1);
        assert_eq!(h.server.members()[0].colors, vec![Rgba::new(0.25, 0.5, 0.75, 1.0)]);
    }

    #[tokio::test]
    async fn test_create_offline_queues() {
        let h = harness();
        h.server.set_offline(true);
        let members = service(&h);

        let member = members.create(ada()).await.unwrap();

        assert_eq!(member.sync_status, SyncStatus::PendingCreate);
        let queue = h.store.pending_mutations().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].entity, EntityKind::FamilyMember);
    }

    #[tokio::test]
    async fn test_create_rejected_rolls_back() {
        let h = harness();
        h.server.fail(
            Method::POST,
            "family-members",
            RemoteError::Client {
                status: 400,
                message: None,
            },
        );
        let members = service(&h);

        assert!(members.create(ada()).await.is_err());
        assert!(members.members().is_empty());
    }

    #[tokio::test]
    async fn test_favorites_online() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;
        let meal = MealId::new();

        let updated = members.add_favorite(member.id, meal).await.unwrap();
        assert!(updated.favorite_meals.contains(&meal));
        assert_eq!(updated.sync_status, SyncStatus::Synced);
        assert_eq!(h.server.members()[0].favorite_meal_ids, vec![meal.as_uuid()]);

        let updated = members.remove_favorite(member.id, meal).await.unwrap();
        assert!(updated.favorite_meals.is_empty());
        assert!(h.server.members()[0].favorite_meal_ids.is_empty());
    }

    #[tokio::test]
    async fn test_favorite_unchanged_skips_server() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;

        members.remove_favorite(member.id, MealId::new()).await.unwrap();
        assert!(h.server.requests().iter().all(|r| !r.contains("favorites")));
    }

    #[tokio::test]
    async fn test_favorite_offline_queues_update() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;
        h.server.set_offline(true);
        let meal = MealId::new();

        let updated = members.add_favorite(member.id, meal).await.unwrap();

        assert_eq!(updated.sync_status, SyncStatus::PendingUpdate);
        let queue = h.store.pending_mutations().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind, MutationKind::Update);
        assert_eq!(queue[0].snapshot["favoriteMealIds"][0], meal.to_string());
    }

    #[tokio::test]
    async fn test_favorite_rejected_reverts() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;
        let meal = MealId::new();
        h.server.fail(
            Method::POST,
            format!("family-members/{}/favorites/{}", member.id, meal),
            RemoteError::Server { status: 503 },
        );

        assert!(members.add_favorite(member.id, meal).await.is_err());
        let current = members.get(member.id).unwrap();
        assert!(current.favorite_meals.is_empty());
        assert_eq!(current.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_delete_rejected_restores() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;
        h.server.fail(
            Method::DELETE,
            format!("family-members/{}", member.id),
            RemoteError::Unauthorized,
        );

        assert!(members.delete(member.id).await.is_err());
        assert_eq!(members.get(member.id).unwrap().sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_edits_of_pending_delete_are_refused() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;
        h.server.set_offline(true);
        members.delete(member.id).await.unwrap();

        let mut renamed = member.clone();
        renamed.name = "Grace".to_string();
        let err = members.update(renamed).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Deleting {
                kind: EntityKind::FamilyMember,
                ..
            }
        ));
        assert!(members.add_favorite(member.id, MealId::new()).await.is_err());

        let current = members.get(member.id).unwrap();
        assert_eq!(current.name, "Ada");
        assert_eq!(current.sync_status, SyncStatus::PendingDelete);
        assert_eq!(h.store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replay_update_and_abandon() {
        let h = harness();
        let members = service(&h);
        let member = seed(&h, &members, ada()).await;
        h.server.set_offline(true);

        let mut older = member.clone();
        older.age = 39;
        members.update(older).await.unwrap();
        h.server.set_offline(false);

        let queue = h.store.pending_mutations().await.unwrap();
        members.replay(&queue[0]).await.unwrap();
        h.store.remove_mutation(queue[0].id).await.unwrap();
        assert_eq!(h.server.members()[0].age, 39);
        let current = members.get(member.id).unwrap();
        assert_eq!(current.sync_status, SyncStatus::Synced);

        // A refused update leaves the local copy to the next merge.
        h.server.set_offline(true);
        let mut renamed = current.clone();
        renamed.name = "Ada L.".to_string();
        members.update(renamed).await.unwrap();
        let queue = h.store.pending_mutations().await.unwrap();
        assert_eq!(queue.len(), 1);
        members.abandon(&queue[0]).await;
        assert!(members.get(member.id).unwrap().sync_status.is_synced());
    }
}
