//! Node bodies of the workflow graph

use super::{apply, effects, WorkflowEnv};
use crate::error::OrchestratorError;
use crate::executor::{task, ExecutionResult, ExecutorKind};
use crate::state::{
    ErrorAction, Source, StateManager, ValidationIssue, ValidationReport, WorkflowResults,
    WorkflowState, WorkflowStatus, WorkflowType,
};
use async_trait::async_trait;
use futures::FutureExt;
use opsgraph_core::{Node, NodeContext};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Marks the run as started
pub struct StartNode;

#[async_trait]
impl Node<WorkflowState> for StartNode {
    async fn run(&self, state: &mut WorkflowState, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
        info!(
            workflow_id = %state.id(),
            workflow_type = %state.workflow_type(),
            request = %state.user_request(),
            "Workflow started"
        );
        apply(state, |s| StateManager::set_status(s, WorkflowStatus::Running));
        Ok(())
    }
}

/// Classifies the request into the executors it needs
///
/// On a retry pass executors that already succeeded are kept in `required`
/// but not queued again.
pub struct RouteNode {
    env: Arc<WorkflowEnv>,
}

impl RouteNode {
    pub fn new(env: Arc<WorkflowEnv>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Node<WorkflowState> for RouteNode {
    async fn run(&self, state: &mut WorkflowState, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
        let mut plan = self.env.routing.plan(state.user_request(), state.workflow_type());
        plan.queue.retain(|k| !state.has_succeeded(*k));

        info!(
            workflow_id = %state.id(),
            required = ?plan.required,
            queue = ?plan.queue,
            fallback = plan.fallback,
            "Routing decided"
        );

        let unresolved = plan.required.is_empty();
        let workflow_type = state.workflow_type().clone();
        apply(state, |s| {
            let s = StateManager::set_route(s, plan);
            if unresolved {
                StateManager::add_error(
                    s,
                    Source::Orchestrator,
                    format!("RoutingFailure: no executors resolved for workflow type '{}'", workflow_type),
                )
            } else {
                s
            }
        });
        Ok(())
    }
}

/// Runs one executor; the same body serves every [`ExecutorKind`]
pub struct ExecutorNode {
    kind: ExecutorKind,
    env: Arc<WorkflowEnv>,
}

impl ExecutorNode {
    pub fn new(kind: ExecutorKind, env: Arc<WorkflowEnv>) -> Self {
        Self { kind, env }
    }

    /// Call the executor, turning every way it can go wrong into a failure result
    async fn call(&self, task: &str, state: &WorkflowState, ctx: &NodeContext) -> ExecutionResult {
        let Some(executor) = self.env.registry.get(self.kind) else {
            return ExecutionResult::failure(format!("No executor registered for '{}'", self.kind));
        };

        let limit = ctx.clamp(self.env.executor_timeout);
        let call = AssertUnwindSafe(executor.execute(task, state.context(), ctx.cancel.clone())).catch_unwind();

        match tokio::time::timeout(limit, call).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => ExecutionResult::failure(e.to_string()),
            Ok(Err(_panic)) => ExecutionResult::failure(format!("Executor '{}' panicked", self.kind)),
            Err(_) => ExecutionResult::failure(
                OrchestratorError::Timeout {
                    executor: self.kind.to_string(),
                    duration_secs: limit.as_secs(),
                }
                .to_string(),
            ),
        }
    }
}

#[async_trait]
impl Node<WorkflowState> for ExecutorNode {
    async fn run(&self, state: &mut WorkflowState, ctx: &NodeContext) -> opsgraph_core::Result<()> {
        let kind = self.kind;
        let task = task::describe(kind, state.workflow_type(), state.user_request());
        apply(state, |s| {
            let s = StateManager::dequeue_executor(s, kind);
            StateManager::mark_executor_started(s, kind)
        });
        debug!(
            workflow_id = %state.id(),
            executor = %kind,
            task = %task,
            attempt = state.attempts(kind),
            "Calling executor"
        );

        let output = self.call(&task, state, ctx).await;

        if output.success {
            info!(workflow_id = %state.id(), executor = %kind, "Executor succeeded");
            apply(state, |s| {
                let s = StateManager::mark_executor_completed(s, kind, output.clone());
                effects::apply(s, kind, &task, &output)
            });
        } else {
            let message = output
                .error
                .clone()
                .unwrap_or_else(|| "executor reported failure".to_string());
            warn!(workflow_id = %state.id(), executor = %kind, error = %message, "Executor failed");
            apply(state, |s| {
                let s = StateManager::mark_executor_failed(s, kind, output);
                StateManager::add_error(s, kind, message)
            });
        }
        Ok(())
    }
}

/// Checks that every required executor succeeded and domain postconditions hold
pub struct ValidateNode {
    env: Arc<WorkflowEnv>,
}

impl ValidateNode {
    pub fn new(env: Arc<WorkflowEnv>) -> Self {
        Self { env }
    }

    fn issues(state: &WorkflowState) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let required = state.route().map(|r| r.required.as_slice()).unwrap_or(&[]);

        if required.is_empty() {
            issues.push(ValidationIssue {
                executor: None,
                message: "no executors were routed".to_string(),
            });
        }

        for kind in required {
            if !state.has_succeeded(*kind) {
                issues.push(ValidationIssue {
                    executor: Some(*kind),
                    message: format!("executor '{}' did not complete", kind),
                });
            } else if state.output(*kind).map(|o| !o.success).unwrap_or(true) {
                issues.push(ValidationIssue {
                    executor: Some(*kind),
                    message: format!("executor '{}' output is unacceptable", kind),
                });
            }
        }

        if *state.workflow_type() == WorkflowType::Deployment
            && !matches!(state.pipeline_status(), Some("deployed") | Some("completed"))
        {
            issues.push(ValidationIssue {
                executor: Some(ExecutorKind::Build),
                message: format!(
                    "pipeline status is {}, expected deployed or completed",
                    state.pipeline_status().unwrap_or("unset")
                ),
            });
        }
        issues
    }
}

#[async_trait]
impl Node<WorkflowState> for ValidateNode {
    async fn run(&self, state: &mut WorkflowState, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
        let issues = Self::issues(state);
        let success = issues.is_empty();

        // Only a failure pinned on exactly one executor that already ran can be re-run directly
        let mut blamed: Vec<ExecutorKind> = issues.iter().filter_map(|i| i.executor).collect();
        blamed.sort();
        blamed.dedup();
        let unattributed = issues.iter().any(|i| i.executor.is_none());
        let retry = match blamed.as_slice() {
            [kind]
                if !success
                    && !unattributed
                    && state.has_succeeded(*kind)
                    && state.validation_retries(*kind) < self.env.recovery.max_validation_retries =>
            {
                Some(*kind)
            }
            _ => None,
        };

        if success {
            info!(workflow_id = %state.id(), "Validation passed");
        } else {
            warn!(workflow_id = %state.id(), issues = issues.len(), retry = ?retry, "Validation failed");
        }

        let summary = issues
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let report = ValidationReport {
            success,
            issues,
            retry,
        };

        apply(state, |s| {
            let s = StateManager::set_validation(s, report);
            match (success, retry) {
                (true, _) => s,
                (false, Some(kind)) => StateManager::grant_validation_retry(s, kind),
                (false, None) => StateManager::add_error(
                    s,
                    Source::Orchestrator,
                    format!("ValidationFailure: {}", summary),
                ),
            }
        });
        Ok(())
    }
}

/// Decides between one more routing pass and giving up
pub struct HandleErrorsNode {
    env: Arc<WorkflowEnv>,
}

impl HandleErrorsNode {
    pub fn new(env: Arc<WorkflowEnv>) -> Self {
        Self { env }
    }

    fn retry_target(&self, state: &WorkflowState) -> Option<ExecutorKind> {
        let recovery = &self.env.recovery;
        if state.errors().len() > recovery.max_errors {
            return None;
        }
        match state.unrecovered_failures().as_slice() {
            [kind]
                if recovery.is_retryable(*kind)
                    && state.retries(*kind) < recovery.max_retries_per_executor =>
            {
                Some(*kind)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Node<WorkflowState> for HandleErrorsNode {
    async fn run(&self, state: &mut WorkflowState, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
        if let Some(kind) = self.retry_target(state) {
            info!(
                workflow_id = %state.id(),
                executor = %kind,
                errors = state.errors().len(),
                "Retrying through routing"
            );
            apply(state, |s| {
                let s = StateManager::grant_retry(s, kind);
                StateManager::set_error_action(s, ErrorAction::Retry)
            });
            return Ok(());
        }

        let errors = state.errors().len();
        let any_succeeded = state
            .route()
            .map(|r| r.required.iter().any(|k| state.has_succeeded(*k)))
            .unwrap_or(false);
        let status = if errors > self.env.recovery.max_errors {
            warn!(workflow_id = %state.id(), errors, "Error budget exceeded");
            WorkflowStatus::Failed
        } else if any_succeeded {
            WorkflowStatus::PartialSuccess
        } else {
            WorkflowStatus::Failed
        };

        info!(workflow_id = %state.id(), status = %status, "Giving up on recovery");
        apply(state, |s| {
            let s = StateManager::set_status(s, status);
            StateManager::set_error_action(s, ErrorAction::Finalize)
        });
        Ok(())
    }
}

/// Settles the final status and stores the results
pub struct FinalizeNode;

impl FinalizeNode {
    fn final_status(state: &WorkflowState) -> WorkflowStatus {
        match state.status() {
            WorkflowStatus::Pending => WorkflowStatus::Failed,
            WorkflowStatus::Running if state.interruption().is_some() => WorkflowStatus::Failed,
            WorkflowStatus::Running if state.errors().is_empty() => WorkflowStatus::Completed,
            WorkflowStatus::Running => {
                let all_succeeded = state
                    .route()
                    .map(|r| !r.required.is_empty() && r.required.iter().all(|k| state.has_succeeded(*k)))
                    .unwrap_or(false);
                if all_succeeded {
                    WorkflowStatus::CompletedWithErrors
                } else {
                    WorkflowStatus::Failed
                }
            }
            settled => settled,
        }
    }
}

#[async_trait]
impl Node<WorkflowState> for FinalizeNode {
    async fn run(&self, state: &mut WorkflowState, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
        let status = Self::final_status(state);
        let results = WorkflowResults::from_state(state);
        info!(
            workflow_id = %state.id(),
            status = %status,
            completed = results.executors_completed.len(),
            failed = results.executors_failed.len(),
            errors = results.errors.len(),
            "Workflow finalized"
        );
        apply(state, |s| StateManager::finalize(s, status, results));
        Ok(())
    }
}
