use thiserror::Error;

use crate::models::EntityKind;
use crate::remote::RemoteError;
use crate::store::StorageError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} is being deleted: {id}")]
    Deleting { kind: EntityKind, id: String },

    #[error("Invalid queued snapshot: {0}")]
    Snapshot(String),
}

impl ServiceError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        ServiceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn deleting(kind: EntityKind, id: impl ToString) -> Self {
        ServiceError::Deleting {
            kind,
            id: id.to_string(),
        }
    }

    /// True when the failure means "server unreachable" rather than a verdict.
    pub fn is_network(&self) -> bool {
        matches!(self, ServiceError::Remote(e) if e.is_network())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_network() {
        assert!(ServiceError::from(RemoteError::Unreachable("down".into())).is_network());
        assert!(!ServiceError::from(RemoteError::NotFound).is_network());
        assert!(!ServiceError::not_found(EntityKind::Meal, "x").is_network());
    }

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found(EntityKind::FamilyMember, "abc");
        assert_eq!(err.to_string(), "family-member not found: abc");
    }

    #[test]
    fn test_deleting_message() {
        let err = ServiceError::deleting(EntityKind::Meal, "abc");
        assert_eq!(err.to_string(), "meal is being deleted: abc");
        assert!(!err.is_network());
    }
}
