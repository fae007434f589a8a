//! Task executors - the side-effecting collaborators the orchestrator sequences
//!
//! # Components
//!
//! - **Contract** - [`TaskExecutor`] and its [`ExecutionResult`]
//! - **Registry** - lookup from [`ExecutorKind`] to an executor instance
//! - **Command executor** - runs a configured shell command per call
//! - **Echo executor** - side-effect-free stand-in for dry runs
//! - **Task descriptions** - the task text each executor receives
//! - **Retry** - exponential backoff used inside executors

mod command;
mod echo;
mod kind;
mod registry;
pub mod retry;
pub mod task;

pub use command::CommandExecutor;
pub use echo::EchoExecutor;
pub use kind::ExecutorKind;
pub use registry::ExecutorRegistry;
pub use retry::{with_retry, RetryConfig};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Key/value map shared between the orchestrator and executors
pub type Context = Map<String, Value>;

/// Terminal signal of one executor call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Result payload; empty on failure
    #[serde(default)]
    pub result: Map<String, Value>,

    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the executor finished
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// Create a successful execution result
    pub fn success(result: Map<String, Value>) -> Self {
        Self {
            success: true,
            result,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed execution result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Map::new(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// Look up a field of the result payload
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.result.get(key)
    }
}

/// Uniform contract every executor implements
///
/// Returning `Ok` with `success = false` and returning `Err` are treated the
/// same by the orchestrator: the executor is marked failed and the error is
/// recorded. Implementations own their internal retries and should stop
/// promptly once `cancel` fires.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run one task with the workflow's current context
    async fn execute(
        &self,
        task: &str,
        context: &Context,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_result() {
        let mut payload = Map::new();
        payload.insert("pipeline_status".to_string(), json!("deployed"));
        let result = ExecutionResult::success(payload);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.get("pipeline_status"), Some(&json!("deployed")));
    }

    #[test]
    fn test_failure_result() {
        let result = ExecutionResult::failure("terraform apply exited with 1");
        assert!(!result.success);
        assert!(result.result.is_empty());
        assert_eq!(result.error.as_deref(), Some("terraform apply exited with 1"));
    }

    #[test]
    fn test_result_deserializes_without_payload() {
        let result: ExecutionResult = serde_json::from_value(json!({
            "success": false,
            "error": "boom",
            "timestamp": "2026-01-05T10:00:00Z"
        }))
        .unwrap();
        assert!(!result.success);
        assert!(result.result.is_empty());
    }
}
