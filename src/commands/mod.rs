use clap::ValueEnum;

mod config_cmd;
mod meal;
mod member;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use meal::MealCommand;
pub use member::MemberCommand;
pub use sync_cmd::SyncCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Confirmation line for a write that may have been queued.
fn queued_note(synced: bool) -> &'static str {
    if synced {
        ""
    } else {
        " (saved locally, will sync when the server is reachable)"
    }
}
