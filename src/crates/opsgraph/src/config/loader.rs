//! Configuration loader with layered sources
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.opsgraph/opsgraph.toml
//! 3. Project-level config: ./.opsgraph/opsgraph.toml
//! 4. An explicit file passed with `--config`
//!
//! Later layers are deep-merged over earlier ones, so a project file that
//! only sets `[recovery] max_errors` keeps every other user-level setting.

use crate::config::schema::OpsgraphConfig;
use crate::error::{OrchestratorError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration loader that handles user, project and explicit configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            user_config_path: Self::default_user_config_path(),
            project_config_path: Self::default_project_config_path(),
            explicit_config_path: None,
        }
    }

    /// Also load `path`, last and mandatory
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_config_path = Some(path.into());
        self
    }

    /// Override the user-level path
    pub fn with_user_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    /// Override the project-level path
    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config_path = path.into();
        self
    }

    /// User-level config path (~/.opsgraph/opsgraph.toml), if a home directory exists
    fn default_user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".opsgraph").join("opsgraph.toml"))
    }

    /// Project-level config path (./.opsgraph/opsgraph.toml)
    fn default_project_config_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".opsgraph")
            .join("opsgraph.toml")
    }

    /// Load configuration from every layer
    ///
    /// Missing user and project files are skipped. A missing or invalid
    /// explicit file is an error, as is any file that fails to parse.
    pub async fn load(&self) -> Result<OpsgraphConfig> {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        info!("Loading configuration with defaults");

        if let Some(user_path) = &self.user_config_path {
            if user_path.exists() {
                let user = Self::read_layer(user_path).await?;
                debug!(path = %user_path.display(), "Loaded user-level config");
                merge_values(&mut merged, user);
            } else {
                debug!(path = %user_path.display(), "User-level config not found");
            }
        }

        if self.project_config_path.exists() {
            let project = Self::read_layer(&self.project_config_path).await?;
            debug!(path = %self.project_config_path.display(), "Loaded project-level config");
            merge_values(&mut merged, project);
        } else {
            debug!(path = %self.project_config_path.display(), "Project-level config not found");
        }

        if let Some(explicit) = &self.explicit_config_path {
            if !explicit.exists() {
                return Err(OrchestratorError::Config(format!(
                    "Config file not found: {}",
                    explicit.display()
                )));
            }
            let layer = Self::read_layer(explicit).await?;
            debug!(path = %explicit.display(), "Loaded explicit config");
            merge_values(&mut merged, layer);
        }

        let mut config: OpsgraphConfig = merged
            .try_into()
            .map_err(|e| OrchestratorError::Config(format!("Invalid configuration: {}", e)))?;

        config.resolve_env_vars();
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Read and parse one TOML file without applying defaults
    async fn read_layer(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| OrchestratorError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| OrchestratorError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively merge `overlay` into `base`; tables merge, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
