use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::entity::Entity;
use super::ids::{MealId, MemberId};
use super::pending::EntityKind;
use super::sync_status::SyncStatus;

/// A display color stored as exact RGBA components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMember {
    pub id: MemberId,
    pub name: String,
    pub role: String,
    pub age: u32,
    pub icon: String,
    pub colors: Vec<Rgba>,
    pub activities: Vec<String>,
    pub preferences: String,
    pub favorite_meals: BTreeSet<MealId>,
    pub allergens: Vec<String>,
    pub favorite_drinks: Vec<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl FamilyMember {
    pub fn new(name: impl Into<String>, role: impl Into<String>, age: u32) -> Self {
        Self {
            id: MemberId::new(),
            name: name.into(),
            role: role.into(),
            age,
            icon: String::new(),
            colors: Vec::new(),
            activities: Vec::new(),
            preferences: String::new(),
            favorite_meals: BTreeSet::new(),
            allergens: Vec::new(),
            favorite_drinks: Vec::new(),
            updated_at: Utc::now(),
            sync_status: SyncStatus::Synced,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_colors(mut self, colors: Vec<Rgba>) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_activities(mut self, activities: Vec<String>) -> Self {
        self.activities = activities;
        self
    }

    pub fn with_preferences(mut self, preferences: impl Into<String>) -> Self {
        self.preferences = preferences.into();
        self
    }

    pub fn with_allergens(mut self, allergens: Vec<String>) -> Self {
        self.allergens = allergens;
        self
    }

    pub fn with_favorite_drinks(mut self, drinks: Vec<String>) -> Self {
        self.favorite_drinks = drinks;
        self
    }

    /// Returns false if the meal was already a favorite.
    pub fn add_favorite(&mut self, meal_id: MealId) -> bool {
        self.favorite_meals.insert(meal_id)
    }

    /// Returns false if the meal was not a favorite.
    pub fn remove_favorite(&mut self, meal_id: MealId) -> bool {
        self.favorite_meals.remove(&meal_id)
    }
}

impl Entity for FamilyMember {
    type Id = MemberId;

    const KIND: EntityKind = EntityKind::FamilyMember;

    fn id(&self) -> MemberId {
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

impl fmt::Display for FamilyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}, {})", self.name, self.role, self.age)?;

        if !self.activities.is_empty() {
            writeln!(f, "Activities: {}", self.activities.join(", "))?;
        }
        if !self.allergens.is_empty() {
            writeln!(f, "Allergens: {}", self.allergens.join(", "))?;
        }
        if !self.favorite_drinks.is_empty() {
            writeln!(f, "Drinks: {}", self.favorite_drinks.join(", "))?;
        }
        if !self.preferences.is_empty() {
            writeln!(f, "Preferences: {}", self.preferences)?;
        }
        writeln!(f, "Favorite meals: {}", self.favorite_meals.len())?;
        writeln!(f, "Status: {}", self.sync_status)?;

        Ok(())
    }
}
