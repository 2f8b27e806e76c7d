//! Layered configuration for the host binary.
//!
//! Later layers override earlier ones:
//!
//! 1. `config/default.toml`, compiled into the binary
//! 2. `config/<PLEXUS_ENV>` (default `development`), optional
//! 3. `config/local`, optional
//! 4. `PLEXUS_*` environment variables, e.g. `PLEXUS_APPLICATION__TICK_PERIOD_MS`

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

/// Embedded default configuration
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Prefix of environment overrides; `__` separates nested keys.
const ENV_PREFIX: &str = "PLEXUS";

const DEFAULT_PROFILE: &str = "development";

/// Load the effective configuration.
pub fn load_config() -> Result<AppConfig> {
    let profile =
        std::env::var(format!("{ENV_PREFIX}_ENV")).unwrap_or_else(|_| DEFAULT_PROFILE.into());

    layers(&profile)
        .build()
        .with_context(|| format!("Failed to build configuration for profile '{profile}'"))?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

fn layers(profile: &str) -> ConfigBuilder<DefaultState> {
    let builder =
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    [profile, "local"]
        .into_iter()
        .fold(builder, |builder, overlay| {
            builder.add_source(File::with_name(&format!("config/{overlay}")).required(false))
        })
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
}
