//! Workflow driver
//!
//! The [`Orchestrator`] owns the compiled workflow graph and the read-only
//! collaborators it needs. One orchestrator serves any number of runs,
//! concurrently if needed; every run owns its own [`WorkflowState`].

use crate::config::OpsgraphConfig;
use crate::error::Result;
use crate::executor::{CommandExecutor, Context, ExecutorKind, ExecutorRegistry};
use crate::routing::RoutingPolicy;
use crate::state::{RoutePlan, WorkflowResults, WorkflowState, WorkflowStatus, WorkflowSummary, WorkflowType};
use crate::workflow::{self, RecoveryPolicy, WorkflowEnv};
use opsgraph_core::{CompiledGraph, ExecutionLimits};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// What a caller gets back from [`Orchestrator::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    /// True for `completed` and `completed_with_errors`
    pub success: bool,
    pub workflow_id: String,
    pub results: WorkflowResults,
    pub summary: WorkflowSummary,
    pub state: WorkflowState,
}

impl WorkflowOutcome {
    fn from_state(state: WorkflowState) -> Self {
        let success = matches!(
            state.status(),
            WorkflowStatus::Completed | WorkflowStatus::CompletedWithErrors
        );
        let results = state
            .results()
            .cloned()
            .unwrap_or_else(|| WorkflowResults::from_state(&state));
        Self {
            success,
            workflow_id: state.id().to_string(),
            results,
            summary: WorkflowSummary::from_state(&state),
            state,
        }
    }
}

/// Runs DevOps workflows over a fixed set of executors
pub struct Orchestrator {
    graph: Arc<CompiledGraph<WorkflowState>>,
    env: Arc<WorkflowEnv>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("executors", &self.env.registry.kinds())
            .field("limits", &self.graph.limits())
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator with built-in routing and recovery defaults
    pub fn new(registry: ExecutorRegistry) -> Result<Self> {
        Self::with_config(registry, &OpsgraphConfig::default())
    }

    /// Orchestrator over `registry`, with tables and limits from `config`
    pub fn with_config(registry: ExecutorRegistry, config: &OpsgraphConfig) -> Result<Self> {
        let env = WorkflowEnv::new(registry, RoutingPolicy::from_config(&config.routing)?)
            .with_recovery(RecoveryPolicy::from_config(&config.recovery)?)
            .with_executor_timeout(config.orchestrator.executor_timeout());

        let mut limits = ExecutionLimits::with_max_transitions(
            config
                .orchestrator
                .max_transitions
                .unwrap_or_else(workflow::default_max_transitions),
        );
        if let Some(timeout) = config.orchestrator.run_timeout() {
            limits = limits.with_timeout(timeout);
        }

        Self::from_env(env, limits)
    }

    /// Orchestrator whose executors come from the `[executors]` section
    ///
    /// Kinds without a definition stay unregistered and fail when routed to.
    /// With `dry_run` set every kind gets the side-effect-free echo executor.
    pub fn from_config(config: &OpsgraphConfig, dry_run: bool) -> Result<Self> {
        let registry = if dry_run {
            ExecutorRegistry::dry_run()
        } else {
            let mut registry = ExecutorRegistry::new();
            for (kind, executor) in config.executor_configs()? {
                registry.register(kind, CommandExecutor::from_config(kind, executor));
            }
            registry
        };
        Self::with_config(registry, config)
    }

    /// Orchestrator over a prepared environment
    pub fn from_env(env: WorkflowEnv, limits: ExecutionLimits) -> Result<Self> {
        let env = Arc::new(env);
        let graph = workflow::compile(env.clone(), limits)?;
        Ok(Self {
            graph: Arc::new(graph),
            env,
        })
    }

    /// Run one workflow to completion
    ///
    /// Never fails: every problem during the run ends up in the returned
    /// state's errors and status.
    pub async fn run(
        &self,
        workflow_type: impl Into<WorkflowType>,
        user_request: impl Into<String>,
        context: Context,
    ) -> WorkflowOutcome {
        self.run_with_cancel(workflow_type, user_request, context, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), finishing early with `failed` once `cancel` fires
    pub async fn run_with_cancel(
        &self,
        workflow_type: impl Into<WorkflowType>,
        user_request: impl Into<String>,
        context: Context,
        cancel: CancellationToken,
    ) -> WorkflowOutcome {
        let state = WorkflowState::new(workflow_type, user_request, context);
        let workflow_id = state.id().to_string();
        info!(workflow_id = %workflow_id, workflow_type = %state.workflow_type(), "Running workflow");

        let execution = self.graph.invoke_with_cancel(state, cancel).await;

        info!(
            workflow_id = %workflow_id,
            status = %execution.state.status(),
            transitions = execution.transitions,
            path = ?execution.path,
            "Workflow run ended"
        );
        WorkflowOutcome::from_state(execution.state)
    }

    /// Read-only projection of `state`
    pub fn summarize(state: &WorkflowState) -> WorkflowSummary {
        WorkflowSummary::from_state(state)
    }

    /// What routing would decide for a request, without running anything
    pub fn route(&self, user_request: &str, workflow_type: &WorkflowType) -> RoutePlan {
        self.env.routing.plan(user_request, workflow_type)
    }

    pub fn executors(&self) -> Vec<ExecutorKind> {
        self.env.registry.kinds()
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.graph.limits()
    }
}
