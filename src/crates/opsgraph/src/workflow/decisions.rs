//! Branch selection after each node
//!
//! Each function inspects the state left by its node and returns the id of
//! the next node. They never mutate the state.

use super::{FINALIZE, HANDLE_ERRORS, ROUTE, VALIDATE};
use crate::executor::ExecutorKind;
use crate::state::{ErrorAction, WorkflowState};

/// `route` -> first queued executor, `validate` if everything already ran,
/// `handle_errors` if routing resolved nothing
pub fn after_route(state: &WorkflowState) -> String {
    match state.route() {
        Some(route) if !route.required.is_empty() => match route.next() {
            Some(kind) => kind.as_str().to_string(),
            None => VALIDATE.to_string(),
        },
        _ => HANDLE_ERRORS.to_string(),
    }
}

/// Executor node -> next queued executor, `validate`, or `handle_errors`
pub fn after_executor(kind: ExecutorKind, state: &WorkflowState) -> String {
    let succeeded = state.output(kind).map(|o| o.success).unwrap_or(false);
    if !succeeded {
        return HANDLE_ERRORS.to_string();
    }

    // A direct re-run requested by validation goes straight back to it
    if state.validation().and_then(|v| v.retry) == Some(kind) {
        return VALIDATE.to_string();
    }

    match state.route().and_then(|r| r.next()) {
        Some(next) => next.as_str().to_string(),
        None => VALIDATE.to_string(),
    }
}

/// `validate` -> `finalize`, a single executor re-run, or `handle_errors`
pub fn after_validate(state: &WorkflowState) -> String {
    match state.validation() {
        Some(report) if report.success => FINALIZE.to_string(),
        Some(report) => match report.retry {
            Some(kind) => kind.as_str().to_string(),
            None => HANDLE_ERRORS.to_string(),
        },
        None => HANDLE_ERRORS.to_string(),
    }
}

/// `handle_errors` -> `route` for a granted retry, otherwise `finalize`
pub fn after_handle_errors(state: &WorkflowState) -> String {
    match state.error_action() {
        Some(ErrorAction::Retry) => ROUTE.to_string(),
        _ => FINALIZE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Context, ExecutionResult};
    use crate::state::{RoutePlan, StateManager, ValidationIssue, ValidationReport, WorkflowType};
    use serde_json::Map;

    fn routed(required: Vec<ExecutorKind>) -> WorkflowState {
        let state = WorkflowState::new(WorkflowType::Deployment, "deploy", Context::new());
        StateManager::set_route(state, RoutePlan::new(required, false))
    }

    #[test]
    fn test_after_route() {
        let state = WorkflowState::new(WorkflowType::Generic, "x", Context::new());
        assert_eq!(after_route(&state), HANDLE_ERRORS);

        let state = routed(vec![]);
        assert_eq!(after_route(&state), HANDLE_ERRORS);

        let state = routed(vec![ExecutorKind::Build, ExecutorKind::Security]);
        assert_eq!(after_route(&state), "build");

        let state = StateManager::dequeue_executor(state, ExecutorKind::Build);
        let state = StateManager::dequeue_executor(state, ExecutorKind::Security);
        assert_eq!(after_route(&state), VALIDATE);
    }

    #[test]
    fn test_after_executor_follows_queue() {
        let state = routed(vec![ExecutorKind::Build, ExecutorKind::Security]);
        let state = StateManager::dequeue_executor(state, ExecutorKind::Build);
        let state = StateManager::mark_executor_completed(
            state,
            ExecutorKind::Build,
            ExecutionResult::success(Map::new()),
        );
        assert_eq!(after_executor(ExecutorKind::Build, &state), "security");

        let state = StateManager::dequeue_executor(state, ExecutorKind::Security);
        let state = StateManager::mark_executor_completed(
            state,
            ExecutorKind::Security,
            ExecutionResult::success(Map::new()),
        );
        assert_eq!(after_executor(ExecutorKind::Security, &state), VALIDATE);
    }

    #[test]
    fn test_after_executor_failure_goes_to_handle_errors() {
        let state = routed(vec![ExecutorKind::Build, ExecutorKind::Security]);
        let state = StateManager::mark_executor_failed(
            state,
            ExecutorKind::Build,
            ExecutionResult::failure("exit 1"),
        );
        assert_eq!(after_executor(ExecutorKind::Build, &state), HANDLE_ERRORS);

        // No output at all counts as a failure
        let state = routed(vec![ExecutorKind::Testing]);
        assert_eq!(after_executor(ExecutorKind::Testing, &state), HANDLE_ERRORS);
    }

    #[test]
    fn test_after_validate() {
        let state = routed(vec![ExecutorKind::Build]);
        let ok = StateManager::set_validation(
            state.clone(),
            ValidationReport {
                success: true,
                issues: vec![],
                retry: None,
            },
        );
        assert_eq!(after_validate(&ok), FINALIZE);

        let issue = ValidationIssue {
            executor: Some(ExecutorKind::Build),
            message: "pipeline not deployed".to_string(),
        };
        let retry = StateManager::set_validation(
            state.clone(),
            ValidationReport {
                success: false,
                issues: vec![issue.clone()],
                retry: Some(ExecutorKind::Build),
            },
        );
        assert_eq!(after_validate(&retry), "build");

        let give_up = StateManager::set_validation(
            state,
            ValidationReport {
                success: false,
                issues: vec![issue],
                retry: None,
            },
        );
        assert_eq!(after_validate(&give_up), HANDLE_ERRORS);
    }

    #[test]
    fn test_after_handle_errors() {
        let state = routed(vec![ExecutorKind::Infrastructure]);
        assert_eq!(after_handle_errors(&state), FINALIZE);

        let state = StateManager::set_error_action(state, ErrorAction::Retry);
        assert_eq!(after_handle_errors(&state), ROUTE);

        let state = StateManager::set_error_action(state, ErrorAction::Finalize);
        assert_eq!(after_handle_errors(&state), FINALIZE);
    }
}
