//! State transforms
//!
//! Every change to a [`WorkflowState`] goes through one of these functions.
//! Each takes the state by value and returns the updated state. They are
//! total: bad input is logged and recorded as an orchestrator error entry,
//! never returned as `Err` and never a panic.
//!
//! Invariants maintained here:
//! - `completed_executors` and `failed_executors` are disjoint
//! - names are never removed from either list
//! - entry lists are append-only
//! - once `finalize` has run, further transforms are ignored

use super::{
    Alert, ErrorAction, ErrorEntry, InfrastructureChange, Priority, Recommendation, RoutePlan,
    Severity, Source, ValidationReport, WorkflowResults, WorkflowState, WorkflowStatus,
};
use crate::executor::{Context, ExecutionResult, ExecutorKind};
use chrono::Utc;
use opsgraph_core::Interruption;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

/// Namespace for the state transforms
pub struct StateManager;

impl StateManager {
    /// `current_executor = kind`, and count the attempt
    pub fn mark_executor_started(mut state: WorkflowState, kind: ExecutorKind) -> WorkflowState {
        if Self::frozen(&state, "mark_executor_started") {
            return state;
        }
        state.current_executor = Some(kind);
        *state.attempts.entry(kind).or_insert(0) += 1;
        debug!(workflow_id = %state.id, executor = %kind, attempt = state.attempts(kind), "Executor started");
        Self::touch(state)
    }

    /// Record a successful executor call
    ///
    /// A name already in `failed_executors` is accepted only when a retry was
    /// granted for it; it then joins `recovered_executors`. Otherwise the call
    /// is a precondition violation: it is logged and recorded, and the name is
    /// not added.
    pub fn mark_executor_completed(
        mut state: WorkflowState,
        kind: ExecutorKind,
        output: ExecutionResult,
    ) -> WorkflowState {
        if Self::frozen(&state, "mark_executor_completed") {
            return state;
        }

        if state.failed_executors.contains(&kind) {
            if state.retries(kind) > 0 {
                if !state.recovered_executors.contains(&kind) {
                    state.recovered_executors.push(kind);
                }
            } else {
                state = Self::precondition_violation(
                    state,
                    format!("executor '{}' marked completed after it failed", kind),
                );
            }
        } else if !state.completed_executors.contains(&kind) {
            state.completed_executors.push(kind);
        }

        Self::finish_call(state, kind, output)
    }

    /// Record a failed executor call
    ///
    /// Failing an executor that already succeeded keeps the output but does not
    /// add the name to `failed_executors`. That is expected for a re-run
    /// granted by validation; otherwise it is a precondition violation.
    pub fn mark_executor_failed(
        mut state: WorkflowState,
        kind: ExecutorKind,
        output: ExecutionResult,
    ) -> WorkflowState {
        if Self::frozen(&state, "mark_executor_failed") {
            return state;
        }

        if state.has_succeeded(kind) {
            if state.validation_retries(kind) > 0 {
                debug!(workflow_id = %state.id, executor = %kind, "Validation re-run failed");
            } else {
                state = Self::precondition_violation(
                    state,
                    format!("executor '{}' marked failed after it completed", kind),
                );
            }
        } else if !state.failed_executors.contains(&kind) {
            state.failed_executors.push(kind);
        }

        Self::finish_call(state, kind, output)
    }

    pub fn add_error(state: WorkflowState, source: impl Into<Source>, message: impl Into<String>) -> WorkflowState {
        Self::add_error_with_details(state, source, message, None)
    }

    pub fn add_error_with_details(
        mut state: WorkflowState,
        source: impl Into<Source>,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> WorkflowState {
        if Self::frozen(&state, "add_error") {
            return state;
        }
        let entry = ErrorEntry {
            source: source.into(),
            message: message.into(),
            details,
            timestamp: Utc::now(),
        };
        warn!(workflow_id = %state.id, source = %entry.source, error = %entry.message, "Error recorded");
        state.errors.push(entry);
        Self::touch(state)
    }

    pub fn add_alert(
        state: WorkflowState,
        source: impl Into<Source>,
        severity: Severity,
        message: impl Into<String>,
    ) -> WorkflowState {
        Self::add_alert_entry(state, source, severity, "general", message, Map::new())
    }

    pub fn add_alert_entry(
        mut state: WorkflowState,
        source: impl Into<Source>,
        severity: Severity,
        kind: impl Into<String>,
        message: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> WorkflowState {
        if Self::frozen(&state, "add_alert") {
            return state;
        }
        state.alerts.push(Alert {
            source: source.into(),
            severity,
            kind: kind.into(),
            message: message.into(),
            metadata,
            timestamp: Utc::now(),
        });
        Self::touch(state)
    }

    pub fn add_recommendation(state: WorkflowState, text: impl Into<String>, priority: Priority) -> WorkflowState {
        Self::add_recommendation_entry(state, Source::Orchestrator, text, priority, "general")
    }

    pub fn add_recommendation_entry(
        mut state: WorkflowState,
        source: impl Into<Source>,
        text: impl Into<String>,
        priority: Priority,
        category: impl Into<String>,
    ) -> WorkflowState {
        if Self::frozen(&state, "add_recommendation") {
            return state;
        }
        state.recommendations.push(Recommendation {
            source: source.into(),
            text: text.into(),
            priority,
            category: category.into(),
            timestamp: Utc::now(),
        });
        Self::touch(state)
    }

    pub fn record_infrastructure_change(
        mut state: WorkflowState,
        source: impl Into<Source>,
        kind: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        details: Value,
    ) -> WorkflowState {
        if Self::frozen(&state, "record_infrastructure_change") {
            return state;
        }
        state.infrastructure_changes.push(InfrastructureChange {
            source: source.into(),
            kind: kind.into(),
            resource: resource.into(),
            action: action.into(),
            details,
            timestamp: Utc::now(),
        });
        Self::touch(state)
    }

    pub fn set_pipeline_status(mut state: WorkflowState, status: impl Into<String>) -> WorkflowState {
        if Self::frozen(&state, "set_pipeline_status") {
            return state;
        }
        state.pipeline_status = Some(status.into());
        Self::touch(state)
    }

    pub fn set_build_info(mut state: WorkflowState, info: Value) -> WorkflowState {
        if Self::frozen(&state, "set_build_info") {
            return state;
        }
        state.build_info = Some(info);
        Self::touch(state)
    }

    pub fn set_deployment_info(mut state: WorkflowState, info: Value) -> WorkflowState {
        if Self::frozen(&state, "set_deployment_info") {
            return state;
        }
        state.deployment_info = Some(info);
        Self::touch(state)
    }

    pub fn set_rollback_plan(mut state: WorkflowState, plan: Value) -> WorkflowState {
        if Self::frozen(&state, "set_rollback_plan") {
            return state;
        }
        state.rollback_plan = Some(plan);
        Self::touch(state)
    }

    /// Shallow-merge `metrics` into the state's metrics
    pub fn merge_metrics(mut state: WorkflowState, metrics: Map<String, Value>) -> WorkflowState {
        if Self::frozen(&state, "merge_metrics") {
            return state;
        }
        state.metrics.extend(metrics);
        Self::touch(state)
    }

    /// Shallow-merge `updates` into the context
    pub fn merge_context(mut state: WorkflowState, updates: Context) -> WorkflowState {
        if Self::frozen(&state, "merge_context") {
            return state;
        }
        state.context.extend(updates);
        Self::touch(state)
    }

    /// Move to `status` if the lifecycle allows it
    pub fn set_status(mut state: WorkflowState, status: WorkflowStatus) -> WorkflowState {
        if Self::frozen(&state, "set_status") {
            return state;
        }
        if !state.status.can_transition_to(status) {
            let from = state.status;
            return Self::precondition_violation(
                state,
                format!("illegal status transition {} -> {}", from, status),
            );
        }
        state.status = status;
        Self::touch(state)
    }

    /// Store a routing decision and mirror it into the context
    ///
    /// A new routing pass discards the previous validation report.
    pub fn set_route(mut state: WorkflowState, plan: RoutePlan) -> WorkflowState {
        if Self::frozen(&state, "set_route") {
            return state;
        }
        let routing = match plan.required.as_slice() {
            [single] => single.as_str().to_string(),
            _ => "multi_executor".to_string(),
        };
        state.context.insert("routing".to_string(), json!(routing));
        state
            .context
            .insert("required_executors".to_string(), json!(plan.required));
        state.route = Some(plan);
        state.validation = None;
        Self::touch(state)
    }

    /// Remove `kind` from the pending queue of the current route
    pub fn dequeue_executor(mut state: WorkflowState, kind: ExecutorKind) -> WorkflowState {
        if Self::frozen(&state, "dequeue_executor") {
            return state;
        }
        if let Some(route) = state.route.as_mut() {
            route.queue.retain(|k| *k != kind);
        }
        Self::touch(state)
    }

    /// Store a validation report and mirror it into the context
    pub fn set_validation(mut state: WorkflowState, report: ValidationReport) -> WorkflowState {
        if Self::frozen(&state, "set_validation") {
            return state;
        }
        let issues: Vec<&str> = report.issues.iter().map(|i| i.message.as_str()).collect();
        state.context.insert(
            "validation".to_string(),
            json!({ "success": report.success, "errors": issues }),
        );
        state.validation = Some(report);
        Self::touch(state)
    }

    /// Count an error-recovery retry for `kind`
    pub fn grant_retry(mut state: WorkflowState, kind: ExecutorKind) -> WorkflowState {
        if Self::frozen(&state, "grant_retry") {
            return state;
        }
        *state.retries.entry(kind).or_insert(0) += 1;
        Self::touch(state)
    }

    /// Count a validation retry for `kind`
    pub fn grant_validation_retry(mut state: WorkflowState, kind: ExecutorKind) -> WorkflowState {
        if Self::frozen(&state, "grant_validation_retry") {
            return state;
        }
        *state.validation_retries.entry(kind).or_insert(0) += 1;
        Self::touch(state)
    }

    pub fn set_error_action(mut state: WorkflowState, action: ErrorAction) -> WorkflowState {
        if Self::frozen(&state, "set_error_action") {
            return state;
        }
        state.error_action = Some(action);
        Self::touch(state)
    }

    /// Note that the run was diverted to `finalize`
    pub fn record_interruption(mut state: WorkflowState, interruption: Interruption) -> WorkflowState {
        if Self::frozen(&state, "record_interruption") {
            return state;
        }
        let message = format!("Workflow interrupted: {}", interruption);
        state.interruption = Some(interruption);
        Self::add_error(state, Source::Orchestrator, message)
    }

    /// Store the final status and results; the state is read-only afterwards
    pub fn finalize(mut state: WorkflowState, status: WorkflowStatus, results: WorkflowResults) -> WorkflowState {
        if Self::frozen(&state, "finalize") {
            return state;
        }
        if state.status.can_transition_to(status) {
            state.status = status;
        } else {
            let from = state.status;
            state = Self::precondition_violation(
                state,
                format!("illegal final status {} -> {}", from, status),
            );
        }
        state.current_executor = None;
        state.results = Some(results);
        Self::touch(state)
    }

    fn finish_call(mut state: WorkflowState, kind: ExecutorKind, output: ExecutionResult) -> WorkflowState {
        if state.current_executor == Some(kind) {
            state.current_executor = None;
        }
        state.executor_outputs.insert(kind, output);
        Self::touch(state)
    }

    fn precondition_violation(state: WorkflowState, message: String) -> WorkflowState {
        error!(workflow_id = %state.id, violation = %message, "State precondition violated");
        Self::add_error(state, Source::Orchestrator, format!("Precondition violated: {}", message))
    }

    fn frozen(state: &WorkflowState, operation: &str) -> bool {
        if state.is_finalized() {
            warn!(workflow_id = %state.id, operation, "Ignoring change to finalized workflow");
            true
        } else {
            false
        }
    }

    fn touch(mut state: WorkflowState) -> WorkflowState {
        state.updated_at = Utc::now();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowType;

    fn state() -> WorkflowState {
        WorkflowState::new(WorkflowType::Deployment, "deploy the app", Context::new())
    }

    fn ok() -> ExecutionResult {
        ExecutionResult::success(Map::new())
    }

    fn failed() -> ExecutionResult {
        ExecutionResult::failure("boom")
    }

    #[test]
    fn test_started_then_completed() {
        let s = StateManager::mark_executor_started(state(), ExecutorKind::Build);
        assert_eq!(s.current_executor(), Some(ExecutorKind::Build));
        assert_eq!(s.attempts(ExecutorKind::Build), 1);

        let s = StateManager::mark_executor_completed(s, ExecutorKind::Build, ok());
        assert_eq!(s.current_executor(), None);
        assert_eq!(s.completed_executors(), &[ExecutorKind::Build]);
        assert!(s.output(ExecutorKind::Build).unwrap().success);
    }

    #[test]
    fn test_completed_does_not_clear_other_current() {
        let s = StateManager::mark_executor_started(state(), ExecutorKind::Security);
        let s = StateManager::mark_executor_completed(s, ExecutorKind::Build, ok());
        assert_eq!(s.current_executor(), Some(ExecutorKind::Security));
    }

    #[test]
    fn test_complete_after_fail_without_retry_is_violation() {
        let s = StateManager::mark_executor_failed(state(), ExecutorKind::Build, failed());
        let s = StateManager::mark_executor_completed(s, ExecutorKind::Build, ok());

        assert!(s.completed_executors().is_empty());
        assert_eq!(s.failed_executors(), &[ExecutorKind::Build]);
        assert_eq!(s.errors().len(), 1);
        assert_eq!(s.errors()[0].source, Source::Orchestrator);
        assert!(s.errors()[0].message.contains("Precondition violated"));
    }

    #[test]
    fn test_complete_after_granted_retry_recovers() {
        let s = StateManager::mark_executor_failed(state(), ExecutorKind::Infrastructure, failed());
        let s = StateManager::grant_retry(s, ExecutorKind::Infrastructure);
        let s = StateManager::mark_executor_completed(s, ExecutorKind::Infrastructure, ok());

        assert!(s.completed_executors().is_empty());
        assert_eq!(s.recovered_executors(), &[ExecutorKind::Infrastructure]);
        assert!(s.has_succeeded(ExecutorKind::Infrastructure));
        assert!(s.unrecovered_failures().is_empty());
        assert!(s.errors().is_empty());
    }

    #[test]
    fn test_fail_after_complete_is_violation() {
        let s = StateManager::mark_executor_completed(state(), ExecutorKind::Testing, ok());
        let s = StateManager::mark_executor_failed(s, ExecutorKind::Testing, failed());

        assert!(s.failed_executors().is_empty());
        assert_eq!(s.completed_executors(), &[ExecutorKind::Testing]);
        assert!(!s.output(ExecutorKind::Testing).unwrap().success);
        assert_eq!(s.errors().len(), 1);
    }

    #[test]
    fn test_fail_on_validation_rerun_is_not_violation() {
        let s = StateManager::mark_executor_completed(state(), ExecutorKind::Build, ok());
        let s = StateManager::grant_validation_retry(s, ExecutorKind::Build);
        let s = StateManager::mark_executor_failed(s, ExecutorKind::Build, failed());

        assert!(s.errors().is_empty());
        assert_eq!(s.completed_executors(), &[ExecutorKind::Build]);
        assert!(s.failed_executors().is_empty());
        assert!(!s.output(ExecutorKind::Build).unwrap().success);
    }

    #[test]
    fn test_repeated_failure_not_duplicated() {
        let s = StateManager::mark_executor_failed(state(), ExecutorKind::Security, failed());
        let s = StateManager::mark_executor_failed(s, ExecutorKind::Security, failed());
        assert_eq!(s.failed_executors(), &[ExecutorKind::Security]);
    }

    #[test]
    fn test_entries_are_appended() {
        let s = StateManager::add_error(state(), ExecutorKind::Build, "compile error");
        let s = StateManager::add_alert(s, ExecutorKind::Security, Severity::High, "open port");
        let s = StateManager::add_recommendation(s, "enable caching", Priority::Low);
        let s = StateManager::record_infrastructure_change(
            s,
            ExecutorKind::Infrastructure,
            "kubernetes_deployment",
            "web",
            "scale",
            json!({"replicas": 5}),
        );

        assert_eq!(s.errors().len(), 1);
        assert_eq!(s.alerts()[0].severity, Severity::High);
        assert_eq!(s.alerts()[0].kind, "general");
        assert_eq!(s.recommendations()[0].source, Source::Orchestrator);
        assert_eq!(s.infrastructure_changes()[0].action, "scale");
    }

    #[test]
    fn test_illegal_status_transition_is_recorded() {
        let s = StateManager::set_status(state(), WorkflowStatus::Completed);
        assert_eq!(s.status(), WorkflowStatus::Pending);
        assert_eq!(s.errors().len(), 1);

        let s = StateManager::set_status(s, WorkflowStatus::Running);
        assert_eq!(s.status(), WorkflowStatus::Running);
    }

    #[test]
    fn test_route_mirrored_into_context() {
        let plan = RoutePlan::new(vec![ExecutorKind::Build, ExecutorKind::Security], false);
        let s = StateManager::set_route(state(), plan);
        assert_eq!(s.context()["routing"], json!("multi_executor"));
        assert_eq!(s.context()["required_executors"], json!(["build", "security"]));

        let s = StateManager::dequeue_executor(s, ExecutorKind::Build);
        assert_eq!(s.route().unwrap().queue, vec![ExecutorKind::Security]);
        assert_eq!(s.route().unwrap().required.len(), 2);
    }

    #[test]
    fn test_new_route_discards_validation() {
        let s = StateManager::set_route(state(), RoutePlan::new(vec![ExecutorKind::Build], false));
        let s = StateManager::set_validation(
            s,
            ValidationReport {
                success: false,
                issues: vec![],
                retry: Some(ExecutorKind::Build),
            },
        );
        assert!(s.validation().is_some());

        let s = StateManager::set_route(s, RoutePlan::new(vec![ExecutorKind::Build], false));
        assert!(s.validation().is_none());
    }

    #[test]
    fn test_finalize_freezes_state() {
        let s = StateManager::set_status(state(), WorkflowStatus::Running);
        let s = StateManager::mark_executor_started(s, ExecutorKind::Build);
        let results = WorkflowResults {
            executors_completed: vec![],
            executors_recovered: vec![],
            executors_failed: vec![],
            infrastructure_changes: vec![],
            pipeline_status: None,
            alerts: vec![],
            recommendations: vec![],
            errors: vec![],
            metrics: Map::new(),
            interruption: None,
        };
        let s = StateManager::finalize(s, WorkflowStatus::Completed, results);
        assert!(s.is_finalized());
        assert_eq!(s.current_executor(), None);

        let frozen = s.clone();
        let s = StateManager::add_error(s, Source::Orchestrator, "late");
        let s = StateManager::mark_executor_completed(s, ExecutorKind::Build, ok());
        assert_eq!(s, frozen);
    }
}
