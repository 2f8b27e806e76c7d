//! CLI module for Plexus
//!
//! Provides commands:
//! - `run`: Run the application (default)
//! - `config`: Print the effective configuration
//! - `topics`: List the lifecycle topics

use crate::host::config::AppConfig;
use anyhow::Context;
use clap::{Parser, Subcommand};

/// Plexus event bus host
#[derive(Parser, Debug)]
#[command(name = "plexus")]
#[command(about = "In-process event bus host")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the application (default)
    Run,
    /// Print the effective configuration as TOML
    Config,
    /// List the lifecycle topics the application publishes
    Topics,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => crate::host::run(config).await,
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{rendered}");
            Ok(())
        }
        Commands::Topics => {
            for topic in plexus_core::topics::lifecycle() {
                println!("{topic}");
            }
            Ok(())
        }
    }
}
