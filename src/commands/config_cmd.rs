use clap::{Args, Subcommand};

use super::OutputFormat;
use mealsync::config::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        print_optional("remote.base_url", &config.remote.base_url, |v| v.clone());
                        print_optional("remote.token", &config.remote.token, |_| "(set)".to_string());
                        println!("remote.timeout_secs: {}", config.remote.timeout_secs);
                        println!("remote.probe_timeout_secs: {}", config.remote.probe_timeout_secs);
                        println!();

                        println!("sync.auto_sync: {}", config.sync.auto_sync);
                        println!("sync.interval_secs: {}", config.sync.interval_secs);
                    }
                }
                Ok(())
            }
        }
    }
}

fn print_optional<F>(key: &str, value: &ConfigValue<Option<String>>, show: F)
where
    F: Fn(&String) -> String,
{
    match &value.value {
        Some(v) => println!("{}: {}", key, show(v)),
        None => println!("{}: (not set)", key),
    }
    println!("  source: {}", value.source);
}
