//! Configuration command handlers

use crate::config::{ConfigLoader, OpsgraphConfig};
use crate::error::{OrchestratorError, Result};
use colored::Colorize;
use std::path::PathBuf;

/// Load the layered configuration, adding `explicit` as the last layer
pub async fn load_config(explicit: Option<PathBuf>) -> Result<OpsgraphConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = explicit {
        loader = loader.with_explicit(path);
    }
    loader.load().await
}

/// Handle config show command
pub fn handle_show(config: &OpsgraphConfig, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let rendered = toml::to_string_pretty(config)
        .map_err(|e| OrchestratorError::Config(format!("Failed to render configuration: {}", e)))?;
    println!("{}", "# Effective opsgraph configuration".dimmed());
    println!("{}", rendered);
    Ok(())
}
