//! Sync CLI commands for reconciling with the server.

use clap::{Args, Subcommand};

use mealsync::app::App;
use mealsync::config::Config;
use mealsync::sync::{PassOutcome, SyncPhase};

/// Sync with remote server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show pending changes and server status
    Status,

    /// Keep syncing periodically until interrupted
    Watch {
        /// Seconds between passes (defaults to sync.interval_secs)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

impl SyncCommand {
    pub async fn run(&self, app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => sync(app).await,
            Some(SyncSubcommand::Status) => status(app, config).await,
            Some(SyncSubcommand::Watch { interval }) => {
                let every = interval
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| config.sync.interval());
                watch(app, every).await
            }
        }
    }
}

async fn sync(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let pending = *app.coordinator.pending().borrow();
    println!("Syncing with server ({} pending change(s))...", pending);

    match app.coordinator.sync_pending().await {
        PassOutcome::AlreadyRunning => println!("A sync is already running."),
        PassOutcome::Finished(SyncPhase::Idle) => {
            println!(
                "Sync complete. {} meal(s), {} family member(s).",
                app.meals.meals().len(),
                app.members.members().len()
            );
        }
        PassOutcome::Finished(SyncPhase::Offline) => {
            let remaining = *app.coordinator.pending().borrow();
            println!("Server unreachable. {} change(s) still pending.", remaining);
        }
        PassOutcome::Finished(SyncPhase::Error(message)) => {
            return Err(format!("Sync failed: {}", message).into());
        }
        PassOutcome::Finished(SyncPhase::Syncing) => {}
    }
    Ok(())
}

async fn status(app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Sync Status");
    println!("===========");
    println!();

    if let Some(url) = &config.remote.base_url.value {
        println!("Server:    {}", url);
    }
    println!(
        "Auto-sync: {}",
        if config.sync.auto_sync {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("Pending:   {} change(s)", *app.coordinator.pending().borrow());
    if let Some(last) = app.coordinator.state().last_synced_at {
        println!("Last sync: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if app.gateway.is_reachable().await {
        println!("Server status: ✓ reachable");
    } else {
        println!("Server status: ✗ unreachable");
    }
    Ok(())
}

async fn watch(app: &App, every: std::time::Duration) -> Result<(), Box<dyn std::error::Error>> {
    println!("Syncing every {}s. Press Ctrl-C to stop.", every.as_secs());

    let mut states = app.coordinator.subscribe();
    let handle = app.coordinator.spawn_periodic(every);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if state.phase != SyncPhase::Syncing {
                    println!(
                        "[{}] {} ({} pending)",
                        chrono::Local::now().format("%H:%M:%S"),
                        state.phase,
                        *app.coordinator.pending().borrow()
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.abort();
    Ok(())
}
