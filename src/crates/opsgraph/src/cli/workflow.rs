//! Workflow command handlers

use crate::config::OpsgraphConfig;
use crate::error::{OrchestratorError, Result};
use crate::executor::{Context, ExecutorRegistry};
use crate::orchestrator::{Orchestrator, WorkflowOutcome};
use crate::shutdown::ShutdownCoordinator;
use crate::state::{Severity, WorkflowStatus, WorkflowType};
use colored::Colorize;
use serde_json::Value;
use tracing::info;

/// Parse `key=value` pairs into a context map
///
/// Values that parse as JSON keep their type (`replicas=3` is a number),
/// everything else is a string.
pub fn parse_context(pairs: &[String]) -> Result<Context> {
    let mut context = Context::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            OrchestratorError::Config(format!("Invalid context entry '{}', expected key=value", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(OrchestratorError::Config(format!("Empty key in context entry '{}'", pair)));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

/// Handle run command
///
/// Returns whether the workflow succeeded so the binary can set its exit code.
pub async fn handle_run(
    config: &OpsgraphConfig,
    workflow_type: &str,
    request: &str,
    context: Context,
    dry_run: bool,
    format: &str,
    shutdown: &ShutdownCoordinator,
) -> Result<bool> {
    let orchestrator = Orchestrator::from_config(config, dry_run)?;
    info!(executors = ?orchestrator.executors(), dry_run, "Orchestrator ready");

    let outcome = orchestrator
        .run_with_cancel(workflow_type, request, context, shutdown.token())
        .await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(outcome.success)
}

/// Handle route command
pub fn handle_route(config: &OpsgraphConfig, workflow_type: &str, request: &str, format: &str) -> Result<()> {
    let orchestrator = Orchestrator::with_config(ExecutorRegistry::new(), config)?;
    let plan = orchestrator.route(request, &WorkflowType::from(workflow_type));

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let executors: Vec<&str> = plan.required.iter().map(|k| k.as_str()).collect();
    println!("{}", "Routing plan".bold());
    println!("  Strategy: {:?}", plan.strategy);
    println!("  Executors: {}", executors.join(" -> "));
    if plan.fallback {
        println!("  {}", "No trigger matched; used the workflow-type fallback".yellow());
    }
    Ok(())
}

fn print_outcome(outcome: &WorkflowOutcome) {
    let summary = &outcome.summary;
    let headline = format!("Workflow {}", summary.status);
    let headline = match summary.status {
        WorkflowStatus::Completed => format!("✓ {}", headline).green().bold(),
        WorkflowStatus::CompletedWithErrors | WorkflowStatus::PartialSuccess => {
            format!("⚠ {}", headline).yellow().bold()
        }
        _ => format!("✗ {}", headline).red().bold(),
    };
    println!("{}", headline);
    println!("{}", summary);

    let results = &outcome.results;
    if !results.executors_completed.is_empty() || !results.executors_recovered.is_empty() {
        let names: Vec<&str> = results
            .executors_completed
            .iter()
            .chain(results.executors_recovered.iter())
            .map(|k| k.as_str())
            .collect();
        println!("\n{} {}", "Succeeded:".green(), names.join(", "));
    }
    if !results.executors_failed.is_empty() {
        let names: Vec<&str> = results.executors_failed.iter().map(|k| k.as_str()).collect();
        println!("{} {}", "Failed:".red(), names.join(", "));
    }

    if !results.errors.is_empty() {
        println!("\n{}", "Errors".red().bold());
        for error in &results.errors {
            println!("  [{}] {}", error.source, error.message);
        }
    }

    if !results.alerts.is_empty() {
        println!("\n{}", "Alerts".bold());
        for alert in &results.alerts {
            let severity = alert.severity.as_str().to_uppercase();
            let severity = match alert.severity {
                Severity::Critical | Severity::High => severity.red(),
                Severity::Medium => severity.yellow(),
                _ => severity.normal(),
            };
            println!("  {} [{}] {}", severity, alert.source, alert.message);
        }
    }

    if !results.infrastructure_changes.is_empty() {
        println!("\n{}", "Infrastructure changes".bold());
        for change in &results.infrastructure_changes {
            println!("  {} {} ({})", change.action, change.resource, change.kind);
        }
    }

    if !results.recommendations.is_empty() {
        println!("\n{}", "Recommendations".bold());
        for rec in &results.recommendations {
            println!("  - {}", rec.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_context_types() {
        let context = parse_context(&[
            "environment=staging".to_string(),
            "replicas=3".to_string(),
            "canary=true".to_string(),
            "tags=[\"a\",\"b\"]".to_string(),
            "url=https://example.com/?a=b".to_string(),
        ])
        .unwrap();

        assert_eq!(context["environment"], "staging");
        assert_eq!(context["replicas"], 3);
        assert_eq!(context["canary"], true);
        assert_eq!(context["tags"], json!(["a", "b"]));
        assert_eq!(context["url"], "https://example.com/?a=b");
    }

    #[test]
    fn test_parse_context_rejects_bad_entries() {
        assert!(parse_context(&["novalue".to_string()]).is_err());
        assert!(parse_context(&["=x".to_string()]).is_err());
    }
}
