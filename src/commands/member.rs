use clap::{Args, Subcommand};
use std::io::{self, Write};
use uuid::Uuid;

use super::meal::find_meal;
use super::{queued_note, OutputFormat};
use mealsync::app::App;
use mealsync::models::{FamilyMember, MemberId, Rgba};

#[derive(Args)]
pub struct MemberCommand {
    #[command(subcommand)]
    pub command: MemberSubcommand,
}

#[derive(Subcommand)]
pub enum MemberSubcommand {
    /// Add a family member
    Add {
        /// Name of the family member
        name: String,

        /// Role in the family, e.g. "parent"
        #[arg(long, default_value = "")]
        role: String,

        /// Age in years
        #[arg(long, default_value_t = 0)]
        age: u32,

        /// Icon name
        #[arg(long)]
        icon: Option<String>,

        /// Display color as r,g,b[,a] components in 0..1 (can be repeated)
        #[arg(long = "color", value_name = "RGBA", value_parser = parse_rgba)]
        colors: Vec<Rgba>,

        /// Activity (can be repeated)
        #[arg(long = "activity", value_name = "ACTIVITY")]
        activities: Vec<String>,

        /// Allergen (can be repeated)
        #[arg(long = "allergen", value_name = "ALLERGEN")]
        allergens: Vec<String>,

        /// Favorite drink (can be repeated)
        #[arg(long = "drink", value_name = "DRINK")]
        drinks: Vec<String>,

        /// Free-form food preferences
        #[arg(long)]
        preferences: Option<String>,
    },

    /// List family members
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a family member's details
    Show {
        /// Member ID (UUID) or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update a family member
    Update {
        /// Member ID (UUID) or name
        identifier: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New role
        #[arg(long)]
        role: Option<String>,

        /// New age
        #[arg(long)]
        age: Option<u32>,

        /// New preferences
        #[arg(long)]
        preferences: Option<String>,
    },

    /// Delete a family member
    Delete {
        /// Member ID (UUID) or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Mark a meal as a favorite
    Favorite {
        /// Member ID (UUID) or name
        member: String,

        /// Meal ID (UUID) or name
        meal: String,
    },

    /// Remove a meal from favorites
    Unfavorite {
        /// Member ID (UUID) or name
        member: String,

        /// Meal ID (UUID) or name
        meal: String,
    },
}

impl MemberCommand {
    /// Whether the command changes local state.
    pub fn is_write(&self) -> bool {
        !matches!(
            self.command,
            MemberSubcommand::List { .. } | MemberSubcommand::Show { .. }
        )
    }

    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MemberSubcommand::Add {
                name,
                role,
                age,
                icon,
                colors,
                activities,
                allergens,
                drinks,
                preferences,
            } => {
                if name.trim().is_empty() {
                    return Err("Member name cannot be empty".into());
                }

                let mut member = FamilyMember::new(name.trim(), role.trim(), *age)
                    .with_colors(colors.clone())
                    .with_activities(activities.clone())
                    .with_allergens(allergens.clone())
                    .with_favorite_drinks(drinks.clone());
                if let Some(icon) = icon {
                    member = member.with_icon(icon);
                }
                if let Some(preferences) = preferences {
                    member = member.with_preferences(preferences);
                }

                let created = app.members.create(member).await?;
                println!(
                    "Added family member{}:",
                    queued_note(created.sync_status.is_synced())
                );
                println!("{}", created);
                Ok(())
            }

            MemberSubcommand::List { format } => {
                let members = app.members.members();
                if members.is_empty() {
                    println!("No family members found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&members)?);
                    }
                    OutputFormat::Text => {
                        println!(
                            "{:<36}  {:<20}  {:<10}  {:>3}  STATUS",
                            "ID", "NAME", "ROLE", "AGE"
                        );
                        println!("{}", "-".repeat(90));
                        for member in &members {
                            println!(
                                "{:<36}  {:<20}  {:<10}  {:>3}  {}",
                                member.id, member.name, member.role, member.age, member.sync_status
                            );
                        }
                        println!("\nTotal: {} member(s)", members.len());
                    }
                }
                Ok(())
            }

            MemberSubcommand::Show { identifier, format } => {
                let member = find_member(app, identifier)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&member)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", member);
                        for meal_id in &member.favorite_meals {
                            match app.meals.get(*meal_id) {
                                Some(meal) => println!("  * {}", meal.name),
                                None => println!("  * {}", meal_id),
                            }
                        }
                    }
                }
                Ok(())
            }

            MemberSubcommand::Update {
                identifier,
                name,
                role,
                age,
                preferences,
            } => {
                let has_updates =
                    name.is_some() || role.is_some() || age.is_some() || preferences.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut member = find_member(app, identifier)?;
                if let Some(new_name) = name {
                    member.name = new_name.trim().to_string();
                }
                if let Some(new_role) = role {
                    member.role = new_role.clone();
                }
                if let Some(new_age) = age {
                    member.age = *new_age;
                }
                if let Some(new_preferences) = preferences {
                    member.preferences = new_preferences.clone();
                }

                let updated = app.members.update(member).await?;
                println!(
                    "Updated family member{}:",
                    queued_note(updated.sync_status.is_synced())
                );
                println!("{}", updated);
                Ok(())
            }

            MemberSubcommand::Delete { identifier, force } => {
                let member = find_member(app, identifier)?;

                if !force {
                    print!("Delete family member '{}'? [y/N] ", member.name);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                app.members.delete(member.id).await?;
                let queued = app.members.get(member.id).is_some();
                println!("Deleted family member: {}{}", member.name, queued_note(!queued));
                Ok(())
            }

            MemberSubcommand::Favorite { member, meal } => {
                let member = find_member(app, member)?;
                let meal = find_meal(app, meal)?;
                let updated = app.members.add_favorite(member.id, meal.id).await?;
                println!(
                    "'{}' is now a favorite of {}{}",
                    meal.name,
                    updated.name,
                    queued_note(updated.sync_status.is_synced())
                );
                Ok(())
            }

            MemberSubcommand::Unfavorite { member, meal } => {
                let member = find_member(app, member)?;
                let meal = find_meal(app, meal)?;
                let updated = app.members.remove_favorite(member.id, meal.id).await?;
                println!(
                    "'{}' is no longer a favorite of {}{}",
                    meal.name,
                    updated.name,
                    queued_note(updated.sync_status.is_synced())
                );
                Ok(())
            }
        }
    }
}

/// Looks a family member up by UUID, then by case-insensitive name.
pub(crate) fn find_member(app: &App, identifier: &str) -> Result<FamilyMember, String> {
    let found = match Uuid::parse_str(identifier) {
        Ok(uuid) => app.members.get(MemberId::from_uuid(uuid)),
        Err(_) => app
            .members
            .members()
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(identifier)),
    };
    found.ok_or_else(|| format!("Family member not found: {}", identifier))
}

/// Parses `r,g,b` or `r,g,b,a` with components in `0.0..=1.0`.
fn parse_rgba(value: &str) -> Result<Rgba, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Invalid color '{}': {}", value, e))?;

    let (red, green, blue, alpha) = match parts.as_slice() {
        [r, g, b] => (*r, *g, *b, 1.0),
        [r, g, b, a] => (*r, *g, *b, *a),
        _ => return Err(format!("Invalid color '{}': expected r,g,b[,a]", value)),
    };
    if [red, green, blue, alpha].iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err(format!("Invalid color '{}': components must be within 0..1", value));
    }
    Ok(Rgba::new(red, green, blue, alpha))
}
