use clap::{Args, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use uuid::Uuid;

use super::{queued_note, OutputFormat};
use mealsync::app::App;
use mealsync::models::{Meal, MealId, MemberId, PrepTime};

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Add a new meal
    Add {
        /// Name of the meal
        name: String,

        /// Cuisine, e.g. "Italian"
        #[arg(long, default_value = "")]
        cuisine: String,

        /// Prep time: short, medium, long or very-long
        #[arg(long, default_value = "medium")]
        prep_time: PrepTime,

        /// Free-form note
        #[arg(long)]
        note: Option<String>,

        /// Image file to upload with the meal
        #[arg(long, conflicts_with = "image_url")]
        image: Option<PathBuf>,

        /// Already hosted image URL
        #[arg(long)]
        image_url: Option<String>,
    },

    /// List all meals
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Filter by cuisine
        #[arg(long)]
        cuisine: Option<String>,
    },

    /// Show a meal's details
    Show {
        /// Meal ID (UUID) or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update an existing meal
    Update {
        /// Meal ID (UUID) or name
        identifier: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New cuisine
        #[arg(long)]
        cuisine: Option<String>,

        /// New prep time
        #[arg(long)]
        prep_time: Option<PrepTime>,

        /// New note
        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a meal
    Delete {
        /// Meal ID (UUID) or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Record that a meal was eaten now
    Eaten {
        /// Meal ID (UUID) or name
        identifier: String,

        /// Family member ID or name who ate it (can be repeated)
        #[arg(long = "by", value_name = "MEMBER")]
        by: Vec<String>,
    },
}

impl MealCommand {
    /// Whether the command changes local state.
    pub fn is_write(&self) -> bool {
        !matches!(
            self.command,
            MealSubcommand::List { .. } | MealSubcommand::Show { .. }
        )
    }

    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MealSubcommand::Add {
                name,
                cuisine,
                prep_time,
                note,
                image,
                image_url,
            } => {
                if name.trim().is_empty() {
                    return Err("Meal name cannot be empty".into());
                }

                let mut meal = Meal::new(name.trim(), cuisine.trim(), *prep_time);
                if let Some(note) = note {
                    meal = meal.with_note(note);
                }
                if let Some(url) = image_url {
                    meal = meal.with_image_url(url);
                }
                let image = match image {
                    Some(path) => Some(tokio::fs::read(path).await.map_err(|e| {
                        format!("Failed to read image '{}': {}", path.display(), e)
                    })?),
                    None => None,
                };

                let created = app.meals.create(meal, image).await?;
                println!(
                    "Created meal{}:",
                    queued_note(created.sync_status.is_synced())
                );
                println!("{}", created);
                Ok(())
            }

            MealSubcommand::List { format, cuisine } => {
                let meals: Vec<Meal> = match cuisine {
                    Some(cuisine) => app
                        .meals
                        .meals()
                        .into_iter()
                        .filter(|m| m.cuisine.eq_ignore_ascii_case(cuisine))
                        .collect(),
                    None => app.meals.meals(),
                };

                if meals.is_empty() {
                    println!("No meals found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&meals)?);
                    }
                    OutputFormat::Text => {
                        println!(
                            "{:<36}  {:<30}  {:<12}  {:>5}  STATUS",
                            "ID", "NAME", "CUISINE", "EATEN"
                        );
                        println!("{}", "-".repeat(104));
                        for meal in &meals {
                            println!(
                                "{:<36}  {:<30}  {:<12}  {:>5}  {}",
                                meal.id,
                                truncate(&meal.name, 30),
                                truncate(&meal.cuisine, 12),
                                meal.eaten_count,
                                meal.sync_status
                            );
                        }
                        println!("\nTotal: {} meal(s)", meals.len());
                    }
                }
                Ok(())
            }

            MealSubcommand::Show { identifier, format } => {
                let meal = find_meal(app, identifier)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&meal)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", meal);
                    }
                }
                Ok(())
            }

            MealSubcommand::Update {
                identifier,
                name,
                cuisine,
                prep_time,
                note,
            } => {
                let has_updates =
                    name.is_some() || cuisine.is_some() || prep_time.is_some() || note.is_some();
                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut meal = find_meal(app, identifier)?;
                if let Some(new_name) = name {
                    meal.name = new_name.trim().to_string();
                }
                if let Some(new_cuisine) = cuisine {
                    meal.cuisine = new_cuisine.clone();
                }
                if let Some(new_prep_time) = prep_time {
                    meal.prep_time = *new_prep_time;
                }
                if let Some(new_note) = note {
                    meal.note = Some(new_note.clone());
                }

                let updated = app.meals.update(meal).await?;
                println!(
                    "Updated meal{}:",
                    queued_note(updated.sync_status.is_synced())
                );
                println!("{}", updated);
                Ok(())
            }

            MealSubcommand::Delete { identifier, force } => {
                let meal = find_meal(app, identifier)?;

                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete meal '{}'? [y/N] ", meal.name);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                app.meals.delete(meal.id).await?;
                let queued = app.meals.get(meal.id).is_some();
                println!("Deleted meal: {}{}", meal.name, queued_note(!queued));
                Ok(())
            }

            MealSubcommand::Eaten { identifier, by } => {
                let meal = find_meal(app, identifier)?;
                let members = by
                    .iter()
                    .map(|who| find_member_id(app, who))
                    .collect::<Result<Vec<_>, _>>()?;

                let updated = app.meals.record_eaten(meal.id, &members).await?;
                println!(
                    "Recorded '{}' as eaten ({} time(s)){}",
                    updated.name,
                    updated.eaten_count,
                    queued_note(updated.sync_status.is_synced())
                );
                Ok(())
            }
        }
    }
}

/// Looks a meal up by UUID, then by case-insensitive name.
pub(crate) fn find_meal(app: &App, identifier: &str) -> Result<Meal, String> {
    let found = match Uuid::parse_str(identifier) {
        Ok(uuid) => app.meals.get(MealId::from_uuid(uuid)),
        Err(_) => app
            .meals
            .meals()
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(identifier)),
    };
    found.ok_or_else(|| format!("Meal not found: {}", identifier))
}

fn find_member_id(app: &App, identifier: &str) -> Result<MemberId, String> {
    super::member::find_member(app, identifier).map(|m| m.id)
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let cut: String = value.chars().take(width - 3).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}
