//! Host module for Plexus
//!
//! Builds an application around the event bus and runs it until a shutdown
//! signal arrives.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `subscribers`: Built-in lifecycle subscribers

pub mod config;
mod loader;
mod subscribers;

pub use loader::load_config;

use self::config::AppConfig;
use anyhow::{Context, Result};
use plexus_core::{shutdown_signal_with_controller, Application};
use tracing::info;

/// Run the application until Ctrl+C or SIGTERM
pub async fn run(config: AppConfig) -> Result<()> {
    let app = Application::new(config.application).context("Failed to create application")?;
    let _subscriptions = subscribers::install(app.bus());

    tokio::spawn(shutdown_signal_with_controller(
        app.shutdown_controller().clone(),
    ));

    info!("Starting Plexus v{}", env!("CARGO_PKG_VERSION"));
    app.run().await.context("Application failed")?;
    info!("Plexus stopped");
    Ok(())
}
