//! JSON shapes exchanged with the REST service.
//!
//! Field names are camelCase, ids are UUID strings and dates are ISO-8601.
//! Local-only state (image payload, sync status) never crosses the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FamilyMember, Meal, MealId, MemberId, PrepTime, Rgba, SyncStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealDto {
    pub id: Uuid,
    pub name: String,
    pub cuisine: String,
    pub prep_time: PrepTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub last_eaten: Option<DateTime<Utc>>,
    #[serde(default)]
    pub eaten_count: u32,
    #[serde(default)]
    pub eaten_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Meal> for MealDto {
    fn from(meal: &Meal) -> Self {
        Self {
            id: meal.id.as_uuid(),
            name: meal.name.clone(),
            cuisine: meal.cuisine.clone(),
            prep_time: meal.prep_time,
            image_url: meal.image_url.clone(),
            last_eaten: meal.last_eaten,
            eaten_count: meal.eaten_count,
            eaten_by: meal.eaten_by.iter().map(MemberId::as_uuid).collect(),
            created_at: meal.created_at,
            note: meal.note.clone(),
            updated_at: Some(meal.updated_at),
        }
    }
}

impl MealDto {
    /// Converts a server record into the canonical, synced local form.
    pub fn into_meal(self) -> Meal {
        Meal {
            id: MealId::from_uuid(self.id),
            name: self.name,
            cuisine: self.cuisine,
            prep_time: self.prep_time,
            image_data: None,
            image_url: self.image_url,
            last_eaten: self.last_eaten,
            eaten_count: self.eaten_count,
            eaten_by: self.eaten_by.into_iter().map(MemberId::from_uuid).collect(),
            created_at: self.created_at,
            note: self.note,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
            sync_status: SyncStatus::Synced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMemberDto {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub age: u32,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub colors: Vec<Rgba>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub preferences: String,
    #[serde(default)]
    pub favorite_meal_ids: Vec<Uuid>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub favorite_drinks: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&FamilyMember> for FamilyMemberDto {
    fn from(member: &FamilyMember) -> Self {
        Self {
            id: member.id.as_uuid(),
            name: member.name.clone(),
            role: member.role.clone(),
            age: member.age,
            icon: member.icon.clone(),
            colors: member.colors.clone(),
            activities: member.activities.clone(),
            preferences: member.preferences.clone(),
            favorite_meal_ids: member.favorite_meals.iter().map(MealId::as_uuid).collect(),
            allergens: member.allergens.clone(),
            favorite_drinks: member.favorite_drinks.clone(),
            updated_at: Some(member.updated_at),
        }
    }
}

impl FamilyMemberDto {
    pub fn into_member(self) -> FamilyMember {
        FamilyMember {
            id: MemberId::from_uuid(self.id),
            name: self.name,
            role: self.role,
            age: self.age,
            icon: self.icon,
            colors: self.colors,
            activities: self.activities,
            preferences: self.preferences,
            favorite_meals: self
                .favorite_meal_ids
                .into_iter()
                .map(MealId::from_uuid)
                .collect(),
            allergens: self.allergens,
            favorite_drinks: self.favorite_drinks,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
            sync_status: SyncStatus::Synced,
        }
    }
}

/// Response of `POST images/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub key: String,
}

/// Body of `POST meals/{id}/eaten`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEatenRequest {
    pub family_member_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_wire_roundtrip_drops_local_fields() {
        let member = MemberId::new();
        let mut meal = Meal::new("Pasta", "Italian", PrepTime::Medium)
            .with_note("extra cheese")
            .with_image_url("https://cdn.example.com/pasta.jpg");
        meal.record_eaten(&[member], Utc::now());
        meal.image_data = Some(vec![1, 2, 3]);
        meal.sync_status = SyncStatus::PendingUpdate;

        let json = serde_json::to_string(&MealDto::from(&meal)).unwrap();
        let decoded: MealDto = serde_json::from_str(&json).unwrap();
        let back = decoded.into_meal();

        assert_eq!(back.id, meal.id);
        assert_eq!(back.name, meal.name);
        assert_eq!(back.cuisine, meal.cuisine);
        assert_eq!(back.prep_time, meal.prep_time);
        assert_eq!(back.image_url, meal.image_url);
        assert_eq!(back.last_eaten, meal.last_eaten);
        assert_eq!(back.eaten_count, meal.eaten_count);
        assert_eq!(back.eaten_by, meal.eaten_by);
        assert_eq!(back.created_at, meal.created_at);
        assert_eq!(back.note, meal.note);
        assert!(back.image_data.is_none());
        assert_eq!(back.sync_status, SyncStatus::Synced);
    }

    #[test]
    fn test_meal_wire_field_names() {
        let meal = Meal::new("Ramen", "Japanese", PrepTime::VeryLong);
        let value = serde_json::to_value(MealDto::from(&meal)).unwrap();

        assert_eq!(value["id"], meal.id.to_string());
        assert_eq!(value["prepTime"], "veryLong");
        assert_eq!(value["eatenCount"], 0);
        assert!(value["createdAt"].is_string());
        assert!(value.get("imageUrl").is_none());
    }

    #[test]
    fn test_member_wire_roundtrip() {
        let meal = MealId::new();
        let mut member = FamilyMember::new("Ada", "parent", 38)
            .with_colors(vec![Rgba::new(0.25, 0.5, 0.75, 1.0)])
            .with_activities(vec!["soccer".into()])
            .with_favorite_drinks(vec!["tea".into()]);
        member.add_favorite(meal);

        let value = serde_json::to_value(FamilyMemberDto::from(&member)).unwrap();
        assert_eq!(value["favoriteMealIds"][0], meal.to_string());
        assert_eq!(value["colors"][0]["blue"], 0.75);

        let back: FamilyMemberDto = serde_json::from_value(value).unwrap();
        let back = back.into_member();
        assert_eq!(back.id, member.id);
        assert_eq!(back.colors, member.colors);
        assert_eq!(back.favorite_meals, member.favorite_meals);
        assert_eq!(back.favorite_drinks, member.favorite_drinks);
    }

    #[test]
    fn test_member_dto_tolerates_missing_lists() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"id":"{}","name":"Bo","role":"child","age":7}}"#,
            id
        );
        let dto: FamilyMemberDto = serde_json::from_str(&json).unwrap();
        let member = dto.into_member();
        assert_eq!(member.id.as_uuid(), id);
        assert!(member.favorite_meals.is_empty());
        assert!(member.colors.is_empty());
    }

    #[test]
    fn test_record_eaten_body() {
        let id = Uuid::new_v4();
        let body = RecordEatenRequest {
            family_member_ids: vec![id],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["familyMemberIds"][0], id.to_string());
    }
}
