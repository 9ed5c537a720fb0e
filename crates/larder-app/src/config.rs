use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use larder_intent::InventoryItem;
use larder_llm_api::LlmSettings;

use crate::cli::Cli;

/// Read a TOML settings file
pub fn load_settings_file(path: &Path) -> Result<LlmSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

/// Environment, then the optional config file, then command-line flags.
/// The `.env` file is expected to have been loaded already.
pub fn resolve_settings(cli: &Cli) -> Result<LlmSettings> {
    let mut settings = LlmSettings::from_env();

    if let Some(path) = &cli.config {
        settings = settings.merge(load_settings_file(path)?);
        log::debug!("merged settings from {}", path.display());
    }

    let flags = LlmSettings {
        provider: cli.provider.clone(),
        verbose: cli.verbose,
        ..LlmSettings::default()
    };
    let mut settings = settings.merge(flags);

    // verbose runs also keep request logs on disk
    if settings.verbose && settings.log_dir.is_none() {
        match larder_logging::default_logs_dir() {
            Ok(dir) => settings.log_dir = Some(dir),
            Err(e) => log::warn!("request file logging disabled: {:#}", e),
        }
    }

    Ok(settings)
}

/// Read the inventory snapshot handed to `parse --inventory`
pub fn load_inventory(path: &Path) -> Result<Vec<InventoryItem>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid inventory JSON in {}", path.display()))
}
