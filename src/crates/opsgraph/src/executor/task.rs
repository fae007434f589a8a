//! Task descriptions handed to each executor
//!
//! The task text tells an executor what the operator asked for, framed for
//! its domain. Build executors also use it to infer the pipeline status they
//! produced (a task mentioning "build" yields `built`, one mentioning
//! "deploy" yields `deployed`).

use super::ExecutorKind;
use crate::state::WorkflowType;

/// Build the task description for `kind`
pub fn describe(kind: ExecutorKind, workflow_type: &WorkflowType, request: &str) -> String {
    let lowered = request.to_lowercase();
    let mentions = |word: &str| lowered.contains(word);

    let prefix = match kind {
        ExecutorKind::Build => {
            if *workflow_type == WorkflowType::Deployment {
                "Execute deployment pipeline"
            } else if mentions("build") {
                "Build and test application"
            } else if mentions("test") {
                "Run test suite"
            } else {
                "Execute CI/CD workflow"
            }
        }
        ExecutorKind::Infrastructure => {
            if *workflow_type == WorkflowType::Infrastructure {
                "Manage infrastructure"
            } else if mentions("provision") {
                "Provision infrastructure resources"
            } else if mentions("scale") {
                "Scale infrastructure"
            } else {
                "Execute infrastructure workflow"
            }
        }
        ExecutorKind::Security => {
            if *workflow_type == WorkflowType::Security {
                "Execute security assessment"
            } else if mentions("vulnerability") {
                "Perform vulnerability scan"
            } else if mentions("compliance") {
                "Check compliance"
            } else if mentions("audit") {
                "Conduct security audit"
            } else {
                "Execute security workflow"
            }
        }
        ExecutorKind::Testing => {
            if *workflow_type == WorkflowType::Testing {
                "Execute test suite"
            } else if mentions("coverage") {
                "Analyze test coverage"
            } else if mentions("performance") {
                "Execute performance tests"
            } else if mentions("quality") {
                "Analyze code quality"
            } else {
                "Execute testing workflow"
            }
        }
    };

    format!("{}: {}", prefix, request)
}

/// Pipeline status implied by a build task, if any
pub fn implied_pipeline_status(task: &str) -> Option<&'static str> {
    let task = task.to_lowercase();
    if task.contains("build") {
        Some("built")
    } else if task.contains("deploy") {
        Some("deployed")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_type_takes_precedence() {
        let task = describe(ExecutorKind::Build, &WorkflowType::Deployment, "build and ship v2");
        assert_eq!(task, "Execute deployment pipeline: build and ship v2");

        let task = describe(
            ExecutorKind::Infrastructure,
            &WorkflowType::Infrastructure,
            "scale the cluster",
        );
        assert_eq!(task, "Manage infrastructure: scale the cluster");
    }

    #[test]
    fn test_keyword_variants() {
        let generic = WorkflowType::Generic;
        assert_eq!(
            describe(ExecutorKind::Infrastructure, &generic, "scale web tier"),
            "Scale infrastructure: scale web tier"
        );
        assert_eq!(
            describe(ExecutorKind::Security, &generic, "vulnerability sweep"),
            "Perform vulnerability scan: vulnerability sweep"
        );
        assert_eq!(
            describe(ExecutorKind::Testing, &generic, "Check Coverage"),
            "Analyze test coverage: Check Coverage"
        );
        assert_eq!(
            describe(ExecutorKind::Build, &generic, "cut a release"),
            "Execute CI/CD workflow: cut a release"
        );
    }

    #[test]
    fn test_implied_pipeline_status() {
        assert_eq!(implied_pipeline_status("Build and test application: x"), Some("built"));
        assert_eq!(
            implied_pipeline_status("Execute deployment pipeline: deploy the app"),
            Some("deployed")
        );
        assert_eq!(implied_pipeline_status("Execute CI/CD workflow: release"), None);
    }
}
