//! Read-only projection of a workflow state

use super::{WorkflowState, WorkflowStatus};
use crate::executor::ExecutorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts and identifiers describing a run
///
/// Derived purely from the state, so summarizing the same state twice yields
/// equal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    /// Seconds between creation and the last state change
    pub duration_secs: f64,
    pub executors_completed: usize,
    pub executors_recovered: usize,
    pub executors_failed: usize,
    pub infrastructure_changes: usize,
    pub alerts: usize,
    pub errors: usize,
    pub recommendations: usize,
    pub current_executor: Option<ExecutorKind>,
    pub pipeline_status: Option<String>,
    pub target_environment: Option<String>,
}

impl WorkflowSummary {
    pub fn from_state(state: &WorkflowState) -> Self {
        let duration = state.updated_at - state.created_at;
        Self {
            workflow_id: state.id.clone(),
            workflow_type: state.workflow_type.to_string(),
            status: state.status,
            duration_secs: duration.num_milliseconds().max(0) as f64 / 1000.0,
            executors_completed: state.completed_executors.len(),
            executors_recovered: state.recovered_executors.len(),
            executors_failed: state.unrecovered_failures().len(),
            infrastructure_changes: state.infrastructure_changes.len(),
            alerts: state.alerts.len(),
            errors: state.errors.len(),
            recommendations: state.recommendations.len(),
            current_executor: state.current_executor,
            pipeline_status: state.pipeline_status.clone(),
            target_environment: state.target_environment.clone(),
        }
    }
}

impl fmt::Display for WorkflowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow:       {}", self.workflow_id)?;
        writeln!(f, "Type:           {}", self.workflow_type)?;
        writeln!(f, "Status:         {}", self.status)?;
        writeln!(f, "Duration:       {:.3}s", self.duration_secs)?;
        writeln!(
            f,
            "Executors:      {} completed, {} recovered, {} failed",
            self.executors_completed, self.executors_recovered, self.executors_failed
        )?;
        writeln!(f, "Infra changes:  {}", self.infrastructure_changes)?;
        writeln!(f, "Alerts:         {}", self.alerts)?;
        writeln!(f, "Errors:         {}", self.errors)?;
        write!(f, "Recommendations: {}", self.recommendations)?;
        if let Some(pipeline) = &self.pipeline_status {
            write!(f, "\nPipeline:       {}", pipeline)?;
        }
        if let Some(env) = &self.target_environment {
            write!(f, "\nEnvironment:    {}", env)?;
        }
        Ok(())
    }
}
