use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, MealCommand, MemberCommand, SyncCommand};
use mealsync::sync::PassOutcome;
use mealsync::{App, Config};

#[derive(Parser)]
#[command(name = "mealsync")]
#[command(version)]
#[command(about = "Offline-first meal and family member tracker", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage meals
    Meal(MealCommand),

    /// Manage family members and their favorites
    Member(MemberCommand),

    /// Sync pending changes with the server
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "mealsync=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let app = App::from_config(&config)?;
    app.launch().await;

    let wrote = match &command {
        Commands::Meal(cmd) => {
            cmd.run(&app).await?;
            cmd.is_write()
        }
        Commands::Member(cmd) => {
            cmd.run(&app).await?;
            cmd.is_write()
        }
        Commands::Sync(cmd) => {
            cmd.run(&app, &config).await?;
            false
        }
        Commands::Config(_) => false,
    };

    if wrote && config.sync.auto_sync {
        if let PassOutcome::Finished(phase) = app.coordinator.sync_if_reachable().await {
            tracing::info!(%phase, "Auto-sync finished");
        }
    }

    app.shutdown().await;
    Ok(())
}
