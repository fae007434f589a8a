//! Configuration schema for opsgraph

use crate::error::{OrchestratorError, Result};
use crate::executor::ExecutorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main opsgraph configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OpsgraphConfig {
    /// Run bounds and executor call limits
    pub orchestrator: OrchestratorConfig,

    /// Error recovery policy
    pub recovery: RecoveryConfig,

    /// Routing tables
    pub routing: RoutingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Command-backed executors, keyed by executor name
    pub executors: BTreeMap<String, ExecutorConfig>,
}

/// Orchestrator run bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum edges followed per run (default: 2 × executors + 6)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transitions: Option<usize>,

    /// Time limit for a single executor call, in seconds
    pub executor_timeout_secs: u64,

    /// Time limit for a whole run, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_transitions: None,
            executor_timeout_secs: 300,
            run_timeout_secs: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn executor_timeout(&self) -> Duration {
        Duration::from_secs(self.executor_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// Error recovery policy applied by `validate` and `handle_errors`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// More errors than this forces `failed`
    pub max_errors: usize,

    /// Executors `handle_errors` may re-route to after a failure
    pub retryable_executors: Vec<String>,

    /// Error-recovery retries per executor
    pub max_retries_per_executor: u32,

    /// Direct re-runs `validate` may grant per executor
    pub max_validation_retries: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_errors: 3,
            retryable_executors: vec!["infrastructure".to_string()],
            max_retries_per_executor: 1,
            max_validation_retries: 1,
        }
    }
}

impl RecoveryConfig {
    /// Retryable executors, parsed
    pub fn retryable(&self) -> Result<Vec<ExecutorKind>> {
        self.retryable_executors
            .iter()
            .map(|name| {
                name.parse().map_err(|e| {
                    OrchestratorError::Config(format!("{} in recovery.retryable_executors", e))
                })
            })
            .collect()
    }
}

/// Routing table overrides; empty sections keep the built-in tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Executor order for multi-executor requests
    pub priority: Vec<String>,

    /// Trigger keywords per executor (replaces that executor's built-ins)
    pub triggers: BTreeMap<String, Vec<String>>,

    /// Fallback executors per workflow type
    pub fallback: BTreeMap<String, Vec<String>>,

    /// Fallback for workflow types without an entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_fallback: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// A command-backed executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program to run (supports ${VAR} interpolation)
    pub command: String,

    /// Arguments (support ${VAR} interpolation)
    pub args: Vec<String>,

    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment (values support ${VAR} interpolation)
    pub env: BTreeMap<String, String>,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Internal retries on failure
    pub max_retries: usize,

    /// Initial retry delay in seconds
    pub retry_delay_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout_secs: 300,
            max_retries: 0,
            retry_delay_secs: 1,
        }
    }
}

impl OpsgraphConfig {
    /// Resolve environment variables in executor definitions
    ///
    /// Supports ${VAR_NAME} anywhere in a value; unknown variables are left as is
    pub fn resolve_env_vars(&mut self) {
        for executor in self.executors.values_mut() {
            executor.command = expand_env_vars(&executor.command);
            for arg in executor.args.iter_mut() {
                *arg = expand_env_vars(arg);
            }
            for value in executor.env.values_mut() {
                *value = expand_env_vars(value);
            }
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_transitions == Some(0) {
            return Err(OrchestratorError::Config(
                "orchestrator.max_transitions must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.executor_timeout_secs == 0 {
            return Err(OrchestratorError::Config(
                "orchestrator.executor_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.recovery.retryable()?;

        if !matches!(self.logging.format.as_str(), "compact" | "pretty" | "json") {
            return Err(OrchestratorError::Config(format!(
                "Unknown logging.format '{}'",
                self.logging.format
            )));
        }

        for (name, executor) in &self.executors {
            name.parse::<ExecutorKind>()
                .map_err(|e| OrchestratorError::Config(format!("{} in [executors]", e)))?;
            if executor.command.trim().is_empty() {
                return Err(OrchestratorError::Config(format!(
                    "executors.{}.command must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Command executors keyed by kind
    pub fn executor_configs(&self) -> Result<Vec<(ExecutorKind, &ExecutorConfig)>> {
        self.executors
            .iter()
            .map(|(name, config)| {
                name.parse::<ExecutorKind>()
                    .map(|kind| (kind, config))
                    .map_err(|e| OrchestratorError::Config(format!("{} in [executors]", e)))
            })
            .collect()
    }
}

/// Expand every `${VAR}` occurrence in `value`
fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(resolved) => out.push_str(&resolved),
                    Err(_) => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OpsgraphConfig::default();
        assert_eq!(config.orchestrator.executor_timeout_secs, 300);
        assert_eq!(config.orchestrator.max_transitions, None);
        assert_eq!(config.recovery.max_errors, 3);
        assert_eq!(config.recovery.retryable().unwrap(), vec![ExecutorKind::Infrastructure]);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("OPSGRAPH_SCHEMA_TEST_REGION", "eu-west-1");
        assert_eq!(
            expand_env_vars("--region=${OPSGRAPH_SCHEMA_TEST_REGION}"),
            "--region=eu-west-1"
        );
        assert_eq!(
            expand_env_vars("${OPSGRAPH_SCHEMA_TEST_MISSING}/x"),
            "${OPSGRAPH_SCHEMA_TEST_MISSING}/x"
        );
        assert_eq!(expand_env_vars("plain"), "plain");
        assert_eq!(expand_env_vars("broken ${OPEN"), "broken ${OPEN");
    }

    #[test]
    fn test_validate_rejects_unknown_executor_section() {
        let mut config = OpsgraphConfig::default();
        config.executors.insert(
            "deployer".to_string(),
            ExecutorConfig {
                command: "deploy.sh".to_string(),
                ..ExecutorConfig::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let mut config = OpsgraphConfig::default();
        config
            .executors
            .insert("build".to_string(), ExecutorConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("executors.build.command"));
    }

    #[test]
    fn test_validate_rejects_bad_format() {
        let mut config = OpsgraphConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
