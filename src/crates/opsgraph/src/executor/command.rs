//! Command-backed executor
//!
//! Runs a configured program once per task. The task text, the workflow
//! context (as JSON) and the executor name are passed through environment
//! variables:
//!
//! | Variable            | Value                         |
//! |---------------------|-------------------------------|
//! | `OPSGRAPH_EXECUTOR` | executor name (`build`, ...)  |
//! | `OPSGRAPH_TASK`     | task description              |
//! | `OPSGRAPH_CONTEXT`  | workflow context, JSON object |
//!
//! A zero exit status is success. If stdout is a JSON object it becomes the
//! result payload; an object carrying a boolean `success` field is read as a
//! full envelope (`success`, `result`, `error`). Any other stdout is kept
//! under `stdout`. Non-zero exits, timeouts and reported failures are retried
//! per the executor's [`RetryConfig`].

use super::{with_retry, Context, ExecutionResult, ExecutorKind, RetryConfig, TaskExecutor};
use crate::config::ExecutorConfig;
use crate::error::{OrchestratorError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Executor that shells out to an external program
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    kind: ExecutorKind,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl CommandExecutor {
    pub fn new(kind: ExecutorKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
        }
    }

    /// Build from an `[executors.<name>]` section
    pub fn from_config(kind: ExecutorKind, config: &ExecutorConfig) -> Self {
        let mut executor = Self::new(kind, config.command.clone())
            .with_args(config.args.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retry(RetryConfig {
                max_retries: config.max_retries,
                initial_delay_secs: config.retry_delay_secs,
                ..RetryConfig::default()
            });
        executor.working_dir = config.working_dir.clone();
        executor.env = config.env.clone();
        executor
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Per-attempt time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn run_once(
        &self,
        task: &str,
        context_json: &str,
        cancel: &CancellationToken,
    ) -> Result<Map<String, Value>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .env("OPSGRAPH_EXECUTOR", self.kind.as_str())
            .env("OPSGRAPH_TASK", task)
            .env("OPSGRAPH_CONTEXT", context_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| {
            OrchestratorError::executor(
                self.kind.as_str(),
                format!("failed to spawn '{}': {}", self.program, e),
            )
        })?;

        // Dropping the child future kills the process
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            output = tokio::time::timeout(self.timeout, child.wait_with_output()) => output,
        };
        let output = output
            .map_err(|_| OrchestratorError::Timeout {
                executor: self.kind.as_str().to_string(),
                duration_secs: self.timeout.as_secs(),
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(
            executor = %self.kind,
            status = ?output.status.code(),
            stdout_len = stdout.len(),
            "Command finished"
        );

        if !output.status.success() {
            let message = if stderr.is_empty() {
                format!("'{}' exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(OrchestratorError::executor(self.kind.as_str(), message));
        }

        parse_stdout(self.kind, &stdout)
    }
}

/// Interpret a successful command's stdout
fn parse_stdout(kind: ExecutorKind, stdout: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(mut object)) => match object.get("success").and_then(Value::as_bool) {
            Some(true) => match object.remove("result") {
                Some(Value::Object(result)) => Ok(result),
                _ => Ok(Map::new()),
            },
            Some(false) => {
                let message = object
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("executor reported failure");
                Err(OrchestratorError::executor(kind.as_str(), message))
            }
            None => Ok(object),
        },
        _ => {
            let mut result = Map::new();
            if !stdout.is_empty() {
                result.insert("stdout".to_string(), json!(stdout));
            }
            Ok(result)
        }
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    #[instrument(skip(self, context, cancel), fields(executor = %self.kind))]
    async fn execute(
        &self,
        task: &str,
        context: &Context,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let context_json = serde_json::to_string(context)?;

        let outcome = with_retry(&self.retry, self.kind.as_str(), &cancel, || {
            self.run_once(task, &context_json, &cancel)
        })
        .await;

        match outcome {
            Ok(result) => Ok(ExecutionResult::success(result)),
            Err(OrchestratorError::Cancelled) => Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(executor = %self.kind, error = %e, "Command executor failed");
                Ok(ExecutionResult::failure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let result = parse_stdout(ExecutorKind::Build, r#"{"pipeline_status": "built"}"#).unwrap();
        assert_eq!(result.get("pipeline_status"), Some(&json!("built")));
    }

    #[test]
    fn test_parse_envelope() {
        let result = parse_stdout(
            ExecutorKind::Testing,
            r#"{"success": true, "result": {"test_metrics": {"passed": 12}}}"#,
        )
        .unwrap();
        assert_eq!(result.get("test_metrics"), Some(&json!({"passed": 12})));

        let err = parse_stdout(
            ExecutorKind::Security,
            r#"{"success": false, "error": "scanner offline"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("scanner offline"));
    }

    #[test]
    fn test_parse_plain_text() {
        let result = parse_stdout(ExecutorKind::Infrastructure, "applied 3 resources").unwrap();
        assert_eq!(result.get("stdout"), Some(&json!("applied 3 resources")));

        assert!(parse_stdout(ExecutorKind::Infrastructure, "").unwrap().is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = ExecutorConfig {
            command: "./scripts/deploy.sh".to_string(),
            args: vec!["--env".to_string(), "staging".to_string()],
            timeout_secs: 42,
            max_retries: 2,
            ..ExecutorConfig::default()
        };
        let executor = CommandExecutor::from_config(ExecutorKind::Build, &config);
        assert_eq!(executor.program, "./scripts/deploy.sh");
        assert_eq!(executor.args, vec!["--env", "staging"]);
        assert_eq!(executor.timeout, Duration::from_secs(42));
        assert_eq!(executor.retry.max_retries, 2);
    }
}
