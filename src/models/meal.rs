use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::entity::Entity;
use super::ids::{MealId, MemberId};
use super::pending::EntityKind;
use super::prep_time::PrepTime;
use super::sync_status::SyncStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meal {
    pub id: MealId,
    pub name: String,
    pub cuisine: String,
    pub prep_time: PrepTime,
    /// Image bytes not yet uploaded. Never persisted with the collection; the
    /// durable copy lives in the blob store under the meal id.
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,
    pub image_url: Option<String>,
    pub last_eaten: Option<DateTime<Utc>>,
    pub eaten_count: u32,
    pub eaten_by: BTreeSet<MemberId>,
    pub created_at: DateTime<Utc>,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl Meal {
    pub fn new(name: impl Into<String>, cuisine: impl Into<String>, prep_time: PrepTime) -> Self {
        let now = Utc::now();
        Self {
            id: MealId::new(),
            name: name.into(),
            cuisine: cuisine.into(),
            prep_time,
            image_data: None,
            image_url: None,
            last_eaten: None,
            eaten_count: 0,
            eaten_by: BTreeSet::new(),
            created_at: now,
            note: None,
            updated_at: now,
            sync_status: SyncStatus::Synced,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_eaten_count(mut self, count: u32) -> Self {
        self.eaten_count = count;
        self
    }

    /// Applies one "we ate this" event.
    pub fn record_eaten(&mut self, members: &[MemberId], at: DateTime<Utc>) {
        self.eaten_count = self.eaten_count.saturating_add(1);
        self.last_eaten = Some(at);
        self.eaten_by.extend(members.iter().copied());
    }

    /// Stores the uploaded image location and drops the local payload.
    pub fn attach_remote_image(&mut self, url: impl Into<String>) {
        self.image_url = Some(url.into());
        self.image_data = None;
    }
}

impl Entity for Meal {
    type Id = MealId;

    const KIND: EntityKind = EntityKind::Meal;

    fn id(&self) -> MealId {
        self.id
    }

    fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    fn set_sync_status(&mut self, status: SyncStatus) {
        self.sync_status = status;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(f, "Cuisine: {}", self.cuisine)?;
        writeln!(f, "Prep time: {}", self.prep_time)?;
        writeln!(f, "Eaten: {} time(s)", self.eaten_count)?;

        if let Some(last) = self.last_eaten {
            writeln!(f, "Last eaten: {}", last.format("%Y-%m-%d %H:%M"))?;
        }
        if let Some(url) = &self.image_url {
            writeln!(f, "Image: {}", url)?;
        } else if self.image_data.is_some() {
            writeln!(f, "Image: (pending upload)")?;
        }
        if let Some(note) = &self.note {
            writeln!(f, "\nNote:\n{}", note)?;
        }
        writeln!(f, "Status: {}", self.sync_status)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_new() {
        let meal = Meal::new("Pasta", "Italian", PrepTime::Medium);
        assert_eq!(meal.name, "Pasta");
        assert_eq!(meal.eaten_count, 0);
        assert!(meal.eaten_by.is_empty());
        assert_eq!(meal.created_at, meal.updated_at);
        assert!(meal.sync_status.is_synced());
    }

    #[test]
    fn test_record_eaten_unions_members() {
        let first = MemberId::new();
        let second = MemberId::new();
        let mut meal = Meal::new("Soup", "French", PrepTime::Short).with_eaten_count(2);

        let at = Utc::now();
        meal.record_eaten(&[first], at);
        meal.record_eaten(&[first, second], at);

        assert_eq!(meal.eaten_count, 4);
        assert_eq!(meal.last_eaten, Some(at));
        assert_eq!(meal.eaten_by.len(), 2);
    }

    #[test]
    fn test_attach_remote_image_clears_payload() {
        let mut meal = Meal::new("Tacos", "Mexican", PrepTime::Short);
        meal.image_data = Some(vec![1, 2, 3]);

        meal.attach_remote_image("https://cdn.example.com/tacos.jpg");

        assert!(meal.image_data.is_none());
        assert_eq!(
            meal.image_url.as_deref(),
            Some("https://cdn.example.com/tacos.jpg")
        );
    }

    #[test]
    fn test_image_payload_is_not_persisted() {
        let mut meal = Meal::new("Curry", "Indian", PrepTime::Long);
        meal.image_data = Some(vec![9; 16]);
        meal.sync_status = SyncStatus::PendingCreate;

        let json = serde_json::to_string(&meal).unwrap();
        let parsed: Meal = serde_json::from_str(&json).unwrap();

        assert!(parsed.image_data.is_none());
        assert_eq!(parsed.sync_status, SyncStatus::PendingCreate);
        assert_eq!(parsed.name, "Curry");
    }

    #[test]
    fn test_meal_display() {
        let meal = Meal::new("Test Meal", "Thai", PrepTime::VeryLong).with_note("spicy");
        let output = format!("{}", meal);
        assert!(output.contains("Test Meal"));
        assert!(output.contains("Prep time: very-long"));
        assert!(output.contains("spicy"));
    }
}
