//! Command executor against real shell processes
#![cfg(unix)]

use opsgraph::config::ExecutorConfig;
use opsgraph::executor::RetryConfig;
use opsgraph::{
    CommandExecutor, Context, ExecutorKind, Orchestrator, OpsgraphConfig, OrchestratorError, TaskExecutor,
    WorkflowStatus, WorkflowType,
};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn shell(kind: ExecutorKind, script: &str) -> CommandExecutor {
    CommandExecutor::new(kind, "sh").with_args(["-c", script])
}

fn no_delay_retries(max_retries: usize) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_secs: 0,
        ..RetryConfig::default()
    }
}

#[tokio::test]
async fn test_json_stdout_becomes_result() {
    let executor = shell(ExecutorKind::Build, r#"echo '{"pipeline_status": "built", "artifacts": 2}'"#);

    let result = executor
        .execute("Build and test application", &Context::new(), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.get("pipeline_status"), Some(&json!("built")));
    assert_eq!(result.get("artifacts"), Some(&json!(2)));
}

#[tokio::test]
async fn test_task_and_context_are_exported() {
    let executor = shell(
        ExecutorKind::Security,
        r#"printf '{"executor": "%s", "task": "%s", "context": %s}' "$OPSGRAPH_EXECUTOR" "$OPSGRAPH_TASK" "$OPSGRAPH_CONTEXT""#,
    )
    .with_env("UNUSED", "1");
    let mut context = Context::new();
    context.insert("environment".to_string(), json!("staging"));

    let result = executor
        .execute("Check compliance", &context, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.get("executor"), Some(&json!("security")));
    assert_eq!(result.get("task"), Some(&json!("Check compliance")));
    assert_eq!(result.get("context"), Some(&json!({"environment": "staging"})));
}

#[tokio::test]
async fn test_nonzero_exit_is_a_failure_result() {
    let executor = shell(ExecutorKind::Infrastructure, "echo 'terraform lock held' >&2; exit 3");

    let result = executor
        .execute("Provision infrastructure resources", &Context::new(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("terraform lock held"));
}

#[tokio::test]
async fn test_internal_retry_recovers() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("attempted");
    let script = format!(
        "if [ -f '{0}' ]; then echo ok; else touch '{0}'; exit 1; fi",
        marker.display()
    );
    let executor = shell(ExecutorKind::Testing, &script).with_retry(no_delay_retries(1));

    let result = executor
        .execute("Run test suite", &Context::new(), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.get("stdout"), Some(&json!("ok")));
}

#[tokio::test]
async fn test_attempt_timeout_is_a_failure_result() {
    let executor = shell(ExecutorKind::Build, "sleep 5").with_timeout(Duration::from_millis(100));

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        executor.execute("Execute CI/CD workflow", &Context::new(), CancellationToken::new()),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_cancellation_stops_the_process() {
    let executor = shell(ExecutorKind::Build, "sleep 5");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(3),
        executor.execute("Execute CI/CD workflow", &Context::new(), cancel),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, Err(OrchestratorError::Cancelled)));
}

#[tokio::test]
async fn test_working_directory_is_used() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("plan.json"), r#"{"rollback_plan": {"replicas": 3}}"#).unwrap();
    let executor = shell(ExecutorKind::Infrastructure, "cat plan.json").with_working_dir(dir.path());

    let result = executor
        .execute("Manage infrastructure", &Context::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.get("rollback_plan"), Some(&json!({"replicas": 3})));
}

#[tokio::test]
async fn test_configured_executors_drive_a_run() {
    let mut config = OpsgraphConfig::default();
    config.executors.insert(
        "build".to_string(),
        ExecutorConfig {
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"echo '{"success": true, "result": {"pipeline_status": "deployed"}}'"#.to_string(),
            ],
            timeout_secs: 10,
            ..ExecutorConfig::default()
        },
    );
    let orchestrator = Orchestrator::from_config(&config, false).unwrap();
    assert_eq!(orchestrator.executors(), vec![ExecutorKind::Build]);

    let outcome = orchestrator
        .run(WorkflowType::Deployment, "deploy the app", Context::new())
        .await;

    assert_eq!(outcome.state.status(), WorkflowStatus::Completed);
    assert_eq!(outcome.results.pipeline_status.as_deref(), Some("deployed"));
}
