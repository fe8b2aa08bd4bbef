//! Entity services: optimistic local mutations backed by the remote service,
//! with a pending queue taking over whenever the server is unreachable.

mod collection;
mod error;
mod family;
mod meal;

use async_trait::async_trait;

use crate::models::{EntityKind, MutationKind, PendingMutation, SyncStatus};

pub use collection::{merge, MergeSummary};
pub use error::ServiceError;
pub use family::FamilyMemberService;
pub use meal::MealService;

/// What the sync coordinator needs from an entity service.
#[async_trait]
pub trait SyncedCollection: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Re-sends one queued mutation.
    async fn replay(&self, mutation: &PendingMutation) -> Result<(), ServiceError>;

    /// Undoes the local effect of a mutation the server refused for good.
    async fn abandon(&self, mutation: &PendingMutation);

    /// Fetches the remote collection and merges it into local state.
    async fn refresh(&self) -> Result<MergeSummary, ServiceError>;
}

/// Status an entity takes when a mutation of `kind` is queued behind `current`.
pub(crate) fn queued_status(current: SyncStatus, kind: MutationKind) -> SyncStatus {
    match (current, kind) {
        (SyncStatus::PendingDelete, _) | (_, MutationKind::Delete) => SyncStatus::PendingDelete,
        (SyncStatus::PendingCreate, _) | (_, MutationKind::Create) => SyncStatus::PendingCreate,
        (_, MutationKind::Update) => SyncStatus::PendingUpdate,
    }
}

/// Other queued mutations for the same entity, still waiting behind `mutation`.
pub(crate) fn has_followups(queue: &[PendingMutation], mutation: &PendingMutation) -> bool {
    queue
        .iter()
        .any(|m| m.entity_id == mutation.entity_id && m.id != mutation.id)
}


#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_queued_status() {
        use MutationKind::*;
        use SyncStatus::*;

        assert_eq!(queued_status(Synced, Update), PendingUpdate);
        assert_eq!(queued_status(PendingUpdate, Update), PendingUpdate);
        assert_eq!(queued_status(PendingCreate, Update), PendingCreate);
        assert_eq!(queued_status(PendingCreate, Delete), PendingDelete);
        assert_eq!(queued_status(Synced, Create), PendingCreate);
        assert_eq!(queued_status(PendingDelete, Update), PendingDelete);
    }

    #[test]
    fn test_has_followups() {
        let entity = Uuid::new_v4();
        let first = PendingMutation::new(
            MutationKind::Create,
            EntityKind::Meal,
            entity,
            serde_json::Value::Null,
        );
        let other = PendingMutation::new(
            MutationKind::Update,
            EntityKind::Meal,
            Uuid::new_v4(),
            serde_json::Value::Null,
        );
        assert!(!has_followups(&[first.clone(), other.clone()], &first));

        let second = PendingMutation::new(
            MutationKind::Update,
            EntityKind::Meal,
            entity,
            serde_json::Value::Null,
        );
        assert!(has_followups(&[first.clone(), second], &first));
    }
}
