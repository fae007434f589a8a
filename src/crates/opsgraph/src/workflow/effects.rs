//! What a successful executor output changes in the workflow state
//!
//! Executors report domain results as well-known keys of their result map:
//!
//! | key                      | executor        | effect                              |
//! |--------------------------|-----------------|-------------------------------------|
//! | `pipeline_status`        | build           | pipeline status (else inferred)     |
//! | `build_info`             | build           | stored as build info                |
//! | `deployment_info`        | build           | stored as deployment info           |
//! | `infrastructure_changes` | infrastructure  | one change entry per element        |
//! | `rollback_plan`          | infrastructure  | stored as rollback plan             |
//! | `security_findings`      | security        | one alert per finding               |
//! | `test_metrics`           | testing         | merged into metrics                 |
//! | `recommendations`        | any             | one recommendation per element      |
//! | `context`                | any             | merged into the workflow context    |
//!
//! Malformed values are skipped with a warning.

use crate::executor::task::implied_pipeline_status;
use crate::executor::{ExecutionResult, ExecutorKind};
use crate::state::{Priority, Severity, StateManager, WorkflowState};
use serde_json::{Map, Value};
use tracing::warn;

/// Fold the domain-relevant parts of `output` into `state`
pub fn apply(state: WorkflowState, kind: ExecutorKind, task: &str, output: &ExecutionResult) -> WorkflowState {
    let state = match kind {
        ExecutorKind::Build => build(state, task, output),
        ExecutorKind::Infrastructure => infrastructure(state, output),
        ExecutorKind::Security => security(state, output),
        ExecutorKind::Testing => testing(state, output),
    };
    common(state, kind, output)
}

fn build(mut state: WorkflowState, task: &str, output: &ExecutionResult) -> WorkflowState {
    let status = output
        .get("pipeline_status")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| implied_pipeline_status(task).map(str::to_string));
    if let Some(status) = status {
        state = StateManager::set_pipeline_status(state, status);
    }
    if let Some(info) = output.get("build_info") {
        state = StateManager::set_build_info(state, info.clone());
    }
    if let Some(info) = output.get("deployment_info") {
        state = StateManager::set_deployment_info(state, info.clone());
    }
    state
}

fn infrastructure(mut state: WorkflowState, output: &ExecutionResult) -> WorkflowState {
    for change in array(output, "infrastructure_changes") {
        let Some(change) = change.as_object() else {
            warn!(value = %change, "Skipping malformed infrastructure change");
            continue;
        };
        state = StateManager::record_infrastructure_change(
            state,
            ExecutorKind::Infrastructure,
            text(change, "type").unwrap_or("infrastructure"),
            text(change, "resource").unwrap_or("unknown"),
            text(change, "action").unwrap_or("updated"),
            change.get("details").cloned().unwrap_or(Value::Null),
        );
    }
    if let Some(plan) = output.get("rollback_plan") {
        state = StateManager::set_rollback_plan(state, plan.clone());
    }
    state
}

fn security(mut state: WorkflowState, output: &ExecutionResult) -> WorkflowState {
    for finding in array(output, "security_findings") {
        let Some(finding) = finding.as_object() else {
            warn!(value = %finding, "Skipping malformed security finding");
            continue;
        };
        let severity = text(finding, "severity")
            .map(Severity::parse_lenient)
            .unwrap_or_default();
        let message = text(finding, "message")
            .or_else(|| text(finding, "description"))
            .unwrap_or("Security finding")
            .to_string();
        let metadata: Map<String, Value> = finding
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "severity" | "message" | "description"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        state = StateManager::add_alert_entry(
            state,
            ExecutorKind::Security,
            severity,
            "security_finding",
            message,
            metadata,
        );
    }
    state
}

fn testing(state: WorkflowState, output: &ExecutionResult) -> WorkflowState {
    match output.get("test_metrics").and_then(Value::as_object) {
        Some(metrics) => StateManager::merge_metrics(state, metrics.clone()),
        None => state,
    }
}

fn common(mut state: WorkflowState, kind: ExecutorKind, output: &ExecutionResult) -> WorkflowState {
    for rec in array(output, "recommendations") {
        let (text_value, priority, category) = match rec {
            Value::String(s) => (s.as_str(), Priority::default(), "general"),
            Value::Object(o) => match text(o, "text").or_else(|| text(o, "recommendation")) {
                Some(t) => (
                    t,
                    text(o, "priority").map(Priority::parse_lenient).unwrap_or_default(),
                    text(o, "category").unwrap_or("general"),
                ),
                None => {
                    warn!(executor = %kind, "Skipping recommendation without text");
                    continue;
                }
            },
            other => {
                warn!(executor = %kind, value = %other, "Skipping malformed recommendation");
                continue;
            }
        };
        state = StateManager::add_recommendation_entry(state, kind, text_value, priority, category);
    }

    if let Some(updates) = output.get("context").and_then(Value::as_object) {
        state = StateManager::merge_context(state, updates.clone());
    }
    state
}

fn array<'a>(output: &'a ExecutionResult, key: &str) -> &'a [Value] {
    output
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}
