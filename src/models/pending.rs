use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Meal,
    FamilyMember,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Meal => write!(f, "meal"),
            EntityKind::FamilyMember => write!(f, "family-member"),
        }
    }
}

/// A mutation that could not reach the server, kept for replay.
///
/// `snapshot` holds the entity in wire form as it was when the mutation was
/// made. `blob_key` names a not-yet-uploaded image in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: Uuid,
    pub kind: MutationKind,
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub snapshot: serde_json::Value,
    pub blob_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingMutation {
    pub fn new(
        kind: MutationKind,
        entity: EntityKind,
        entity_id: Uuid,
        snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            entity,
            entity_id,
            snapshot,
            blob_key: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_blob(mut self, key: impl Into<String>) -> Self {
        self.blob_key = Some(key.into());
        self
    }
}

impl fmt::Display for PendingMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (queued {})",
            self.kind,
            self.entity,
            self.entity_id,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_mutation_json_layout() {
        let entity_id = Uuid::new_v4();
        let mutation = PendingMutation::new(
            MutationKind::Create,
            EntityKind::Meal,
            entity_id,
            serde_json::json!({ "name": "Pasta" }),
        )
        .with_blob(entity_id.to_string());

        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["kind"], "create");
        assert_eq!(value["entity"], "meal");
        assert_eq!(value["blob_key"], entity_id.to_string());
        assert_eq!(value["snapshot"]["name"], "Pasta");
    }

    #[test]
    fn test_pending_mutation_display() {
        let mutation = PendingMutation::new(
            MutationKind::Delete,
            EntityKind::FamilyMember,
            Uuid::nil(),
            serde_json::Value::Null,
        );
        let output = mutation.to_string();
        assert!(output.starts_with("delete family-member 00000000-0000-0000-0000-000000000000"));
    }
}
