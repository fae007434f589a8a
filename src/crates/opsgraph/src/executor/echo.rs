//! Dry-run executor

use super::{Context, ExecutionResult, ExecutorKind, TaskExecutor};
use crate::error::{OrchestratorError, Result};
use async_trait::async_trait;
use serde_json::{json, Map};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Executor that reports what it would do and always succeeds
///
/// Lets a workflow be exercised end to end without touching any tooling.
#[derive(Debug, Clone)]
pub struct EchoExecutor {
    kind: ExecutorKind,
}

impl EchoExecutor {
    pub fn new(kind: ExecutorKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl TaskExecutor for EchoExecutor {
    async fn execute(
        &self,
        task: &str,
        context: &Context,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        info!(executor = %self.kind, task = %task, "Dry run");

        let mut result = Map::new();
        result.insert("dry_run".to_string(), json!(true));
        result.insert("executor".to_string(), json!(self.kind.as_str()));
        result.insert("task".to_string(), json!(task));
        result.insert("context_keys".to_string(), json!(context.keys().collect::<Vec<_>>()));
        Ok(ExecutionResult::success(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_succeeds_with_task() {
        let executor = EchoExecutor::new(ExecutorKind::Testing);
        let mut context = Context::new();
        context.insert("environment".to_string(), json!("staging"));

        let result = executor
            .execute("Execute test suite: run tests", &context, CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.get("task"), Some(&json!("Execute test suite: run tests")));
        assert_eq!(result.get("context_keys"), Some(&json!(["environment"])));
    }

    #[tokio::test]
    async fn test_echo_honours_cancellation() {
        let executor = EchoExecutor::new(ExecutorKind::Build);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = executor.execute("anything", &Context::new(), cancel).await;
        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
    }
}
