//! The DevOps workflow as a state graph
//!
//! ```text
//! start -> route -> <executor>* -> validate -> finalize
//!            ^          |             |  ^
//!            |          v             v  |
//!            +---- handle_errors   <executor> (validation retry)
//!                       |
//!                       v
//!                    finalize
//! ```
//!
//! Every executor gets its own node with the same body, parameterized by
//! [`ExecutorKind`]. Node bodies live in [`nodes`]; the functions that pick
//! the next node live in [`decisions`]; what a successful executor output
//! changes in the state lives in [`effects`].

pub mod decisions;
pub mod effects;
pub mod nodes;

use crate::config::RecoveryConfig;
use crate::error::Result;
use crate::executor::{ExecutionResult, ExecutorKind, ExecutorRegistry};
use crate::routing::RoutingPolicy;
use crate::state::{Source, StateManager, WorkflowState};
use opsgraph_core::{CompiledGraph, ExecutionLimits, GraphError, GraphState, Interruption, StateGraph};
use std::sync::Arc;
use std::time::Duration;

pub const START: &str = "start";
pub const ROUTE: &str = "route";
pub const VALIDATE: &str = "validate";
pub const HANDLE_ERRORS: &str = "handle_errors";
pub const FINALIZE: &str = "finalize";

/// Transition bound used when none is configured: two per executor plus six
pub fn default_max_transitions() -> usize {
    2 * ExecutorKind::ALL.len() + 6
}

/// When `validate` and `handle_errors` may send work back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// More errors than this forces `failed`
    pub max_errors: usize,
    /// Executors `handle_errors` may re-route to
    pub retryable: Vec<ExecutorKind>,
    pub max_retries_per_executor: u32,
    pub max_validation_retries: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_errors: 3,
            retryable: vec![ExecutorKind::Infrastructure],
            max_retries_per_executor: 1,
            max_validation_retries: 1,
        }
    }
}

impl RecoveryPolicy {
    pub fn from_config(config: &RecoveryConfig) -> Result<Self> {
        Ok(Self {
            max_errors: config.max_errors,
            retryable: config.retryable()?,
            max_retries_per_executor: config.max_retries_per_executor,
            max_validation_retries: config.max_validation_retries,
        })
    }

    pub fn is_retryable(&self, kind: ExecutorKind) -> bool {
        self.retryable.contains(&kind)
    }
}

/// Read-only collaborators shared by every node and every run
#[derive(Debug, Clone)]
pub struct WorkflowEnv {
    pub registry: ExecutorRegistry,
    pub routing: RoutingPolicy,
    pub recovery: RecoveryPolicy,
    /// Upper bound on a single executor call
    pub executor_timeout: Duration,
}

impl WorkflowEnv {
    pub fn new(registry: ExecutorRegistry, routing: RoutingPolicy) -> Self {
        Self {
            registry,
            routing,
            recovery: RecoveryPolicy::default(),
            executor_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_executor_timeout(mut self, timeout: Duration) -> Self {
        self.executor_timeout = timeout;
        self
    }
}

/// Assemble the workflow graph over `env`
pub fn build_graph(env: Arc<WorkflowEnv>) -> StateGraph<WorkflowState> {
    let mut graph = StateGraph::new();

    graph.add_node(START, nodes::StartNode);
    graph.add_node(ROUTE, nodes::RouteNode::new(env.clone()));
    for kind in ExecutorKind::ALL {
        graph.add_node(kind.as_str(), nodes::ExecutorNode::new(kind, env.clone()));
    }
    graph.add_node(VALIDATE, nodes::ValidateNode::new(env.clone()));
    graph.add_node(HANDLE_ERRORS, nodes::HandleErrorsNode::new(env));
    graph.add_node(FINALIZE, nodes::FinalizeNode);

    let to_executors = || ExecutorKind::ALL.map(|k| (k.as_str(), k.as_str()));

    graph.add_edge(START, ROUTE);
    graph.add_conditional_edges(
        ROUTE,
        decisions::after_route,
        to_executors()
            .into_iter()
            .chain([(VALIDATE, VALIDATE), (HANDLE_ERRORS, HANDLE_ERRORS)]),
    );
    for kind in ExecutorKind::ALL {
        graph.add_conditional_edges(
            kind.as_str(),
            move |state: &WorkflowState| decisions::after_executor(kind, state),
            to_executors()
                .into_iter()
                .chain([(VALIDATE, VALIDATE), (HANDLE_ERRORS, HANDLE_ERRORS)]),
        );
    }
    graph.add_conditional_edges(
        VALIDATE,
        decisions::after_validate,
        to_executors()
            .into_iter()
            .chain([(FINALIZE, FINALIZE), (HANDLE_ERRORS, HANDLE_ERRORS)]),
    );
    graph.add_conditional_edges(
        HANDLE_ERRORS,
        decisions::after_handle_errors,
        [(ROUTE, ROUTE), (FINALIZE, FINALIZE)],
    );

    graph.set_entry_point(START);
    graph.set_finish_point(FINALIZE);
    graph
}

/// Build and compile the workflow graph
pub fn compile(env: Arc<WorkflowEnv>, limits: ExecutionLimits) -> Result<CompiledGraph<WorkflowState>> {
    Ok(build_graph(env).compile(limits)?)
}

/// Run `f` on the state in place
pub(crate) fn apply(state: &mut WorkflowState, f: impl FnOnce(WorkflowState) -> WorkflowState) {
    let taken = std::mem::take(state);
    *state = f(taken);
}

impl GraphState for WorkflowState {
    fn record_node_error(&mut self, node: &str, error: &GraphError) {
        let message = error.to_string();
        match ExecutorKind::from_node(node) {
            Some(kind) => apply(self, |s| {
                let s = StateManager::mark_executor_failed(s, kind, ExecutionResult::failure(message.clone()));
                StateManager::add_error(s, kind, message)
            }),
            None => apply(self, |s| {
                StateManager::add_error(s, Source::Orchestrator, format!("Node '{}' failed: {}", node, message))
            }),
        }
    }

    fn record_interruption(&mut self, interruption: &Interruption) {
        let interruption = interruption.clone();
        apply(self, |s| StateManager::record_interruption(s, interruption));
    }
}
