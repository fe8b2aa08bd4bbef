mod entity;
mod family_member;
mod ids;
mod meal;
mod pending;
mod prep_time;
mod sync_status;

pub use entity::Entity;
pub use family_member::{FamilyMember, Rgba};
pub use ids::{MealId, MemberId};
pub use meal::Meal;
pub use pending::{EntityKind, MutationKind, PendingMutation};
pub use prep_time::PrepTime;
pub use sync_status::SyncStatus;
