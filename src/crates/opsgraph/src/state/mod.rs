//! Workflow state threaded through every node of a run
//!
//! One [`WorkflowState`] exists per request. It is created by
//! [`WorkflowState::new`], changed only through the
//! [`StateManager`] transforms, and frozen once `finalize` has stored the
//! results. Fields are readable through accessors; nothing outside this
//! module writes them directly.

mod manager;
mod summary;

pub use manager::StateManager;
pub use summary::WorkflowSummary;

use crate::executor::{Context, ExecutionResult, ExecutorKind};
use chrono::{DateTime, Utc};
use opsgraph_core::Interruption;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of workflow requested; drives fallback routing and validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowType {
    Deployment,
    Security,
    Testing,
    Infrastructure,
    #[default]
    Generic,
    /// Any other tag, kept verbatim (lower-cased)
    Other(String),
}

impl WorkflowType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deployment => "deployment",
            Self::Security => "security",
            Self::Testing => "testing",
            Self::Infrastructure => "infrastructure",
            Self::Generic => "generic",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for WorkflowType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "deployment" | "deploy" => Self::Deployment,
            "security" => Self::Security,
            "testing" | "test" => Self::Testing,
            "infrastructure" | "infra" => Self::Infrastructure,
            "generic" | "" => Self::Generic,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for WorkflowType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<WorkflowType> for String {
    fn from(value: WorkflowType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for WorkflowType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a run
///
/// ```text
/// pending ──► running ──► completed | completed_with_errors | partial_success | failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Completed,
    CompletedWithErrors,
    PartialSuccess,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Whether moving from `self` to `next` respects the lifecycle
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Pending | Self::Running | Self::Failed),
            Self::Running => next != Self::Pending,
            terminal => *terminal == next,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced an entry: an executor or the orchestrator itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Source {
    Orchestrator,
    Executor(ExecutorKind),
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Executor(kind) => kind.as_str(),
        }
    }

    pub fn executor(&self) -> Option<ExecutorKind> {
        match self {
            Self::Executor(kind) => Some(*kind),
            Self::Orchestrator => None,
        }
    }
}

impl From<ExecutorKind> for Source {
    fn from(kind: ExecutorKind) -> Self {
        Self::Executor(kind)
    }
}

impl TryFrom<String> for Source {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "orchestrator" {
            Ok(Self::Orchestrator)
        } else {
            value.parse().map(Self::Executor)
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a severity as executors report it; unknown labels map to medium
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "info" | "informational" => Self::Info,
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" | "critical" => Self::High,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub source: Source,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub source: Source,
    pub severity: Severity,
    /// Category such as `security_finding`
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub source: Source,
    pub text: String,
    pub priority: Priority,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureChange {
    pub source: Source,
    /// Resource type, e.g. `kubernetes_deployment`
    pub kind: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

/// How the required executors are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    Single,
    Sequential,
}

/// Outcome of routing a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub strategy: RoutingStrategy,
    /// Every executor the request needs, in priority order
    pub required: Vec<ExecutorKind>,
    /// Executors still to run in this pass
    pub queue: Vec<ExecutorKind>,
    /// True when no trigger matched and the workflow-type fallback was used
    pub fallback: bool,
}

impl RoutePlan {
    pub fn new(required: Vec<ExecutorKind>, fallback: bool) -> Self {
        let strategy = if required.len() > 1 {
            RoutingStrategy::Sequential
        } else {
            RoutingStrategy::Single
        };
        Self {
            strategy,
            queue: required.clone(),
            required,
            fallback,
        }
    }

    pub fn next(&self) -> Option<ExecutorKind> {
        self.queue.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Executor the issue is attributed to, if any
    pub executor: Option<ExecutorKind>,
    pub message: String,
}

/// Result of the `validate` node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub success: bool,
    pub issues: Vec<ValidationIssue>,
    /// Executor to re-run directly, when a validation retry was granted
    pub retry: Option<ExecutorKind>,
}

/// Decision taken by `handle_errors`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    Retry,
    Finalize,
}

/// Aggregated payload stored by `finalize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResults {
    pub executors_completed: Vec<ExecutorKind>,
    pub executors_recovered: Vec<ExecutorKind>,
    pub executors_failed: Vec<ExecutorKind>,
    pub infrastructure_changes: Vec<InfrastructureChange>,
    pub pipeline_status: Option<String>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<ErrorEntry>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interruption: Option<Interruption>,
}

impl WorkflowResults {
    /// Snapshot the accumulated outputs of `state`
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            executors_completed: state.completed_executors.clone(),
            executors_recovered: state.recovered_executors.clone(),
            executors_failed: state.unrecovered_failures(),
            infrastructure_changes: state.infrastructure_changes.clone(),
            pipeline_status: state.pipeline_status.clone(),
            alerts: state.alerts.clone(),
            recommendations: state.recommendations.clone(),
            errors: state.errors.clone(),
            metrics: state.metrics.clone(),
            interruption: state.interruption.clone(),
        }
    }
}

/// The single record threaded through every step of a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub(crate) id: String,
    pub(crate) workflow_type: WorkflowType,
    pub(crate) status: WorkflowStatus,
    pub(crate) user_request: String,
    pub(crate) context: Context,
    pub(crate) current_executor: Option<ExecutorKind>,
    pub(crate) completed_executors: Vec<ExecutorKind>,
    pub(crate) failed_executors: Vec<ExecutorKind>,
    /// Previously failed executors that later succeeded on a granted retry
    pub(crate) recovered_executors: Vec<ExecutorKind>,
    pub(crate) executor_outputs: BTreeMap<ExecutorKind, ExecutionResult>,
    pub(crate) infrastructure_changes: Vec<InfrastructureChange>,
    pub(crate) alerts: Vec<Alert>,
    pub(crate) errors: Vec<ErrorEntry>,
    pub(crate) recommendations: Vec<Recommendation>,
    pub(crate) pipeline_status: Option<String>,
    pub(crate) build_info: Option<Value>,
    pub(crate) deployment_info: Option<Value>,
    pub(crate) metrics: Map<String, Value>,
    pub(crate) rollback_plan: Option<Value>,
    pub(crate) target_environment: Option<String>,
    pub(crate) attempts: BTreeMap<ExecutorKind, u32>,
    pub(crate) retries: BTreeMap<ExecutorKind, u32>,
    pub(crate) validation_retries: BTreeMap<ExecutorKind, u32>,
    pub(crate) route: Option<RoutePlan>,
    pub(crate) validation: Option<ValidationReport>,
    pub(crate) error_action: Option<ErrorAction>,
    pub(crate) interruption: Option<Interruption>,
    pub(crate) results: Option<WorkflowResults>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh `pending` state for one request
    pub fn new(workflow_type: impl Into<WorkflowType>, user_request: impl Into<String>, context: Context) -> Self {
        let now = Utc::now();
        let target_environment = context
            .get("target_environment")
            .or_else(|| context.get("environment"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            id: Uuid::new_v4().to_string(),
            workflow_type: workflow_type.into(),
            user_request: user_request.into(),
            context,
            target_environment,
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn workflow_type(&self) -> &WorkflowType {
        &self.workflow_type
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn user_request(&self) -> &str {
        &self.user_request
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn current_executor(&self) -> Option<ExecutorKind> {
        self.current_executor
    }

    pub fn completed_executors(&self) -> &[ExecutorKind] {
        &self.completed_executors
    }

    pub fn failed_executors(&self) -> &[ExecutorKind] {
        &self.failed_executors
    }

    pub fn recovered_executors(&self) -> &[ExecutorKind] {
        &self.recovered_executors
    }

    pub fn executor_outputs(&self) -> &BTreeMap<ExecutorKind, ExecutionResult> {
        &self.executor_outputs
    }

    pub fn output(&self, kind: ExecutorKind) -> Option<&ExecutionResult> {
        self.executor_outputs.get(&kind)
    }

    pub fn infrastructure_changes(&self) -> &[InfrastructureChange] {
        &self.infrastructure_changes
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn pipeline_status(&self) -> Option<&str> {
        self.pipeline_status.as_deref()
    }

    pub fn build_info(&self) -> Option<&Value> {
        self.build_info.as_ref()
    }

    pub fn deployment_info(&self) -> Option<&Value> {
        self.deployment_info.as_ref()
    }

    pub fn metrics(&self) -> &Map<String, Value> {
        &self.metrics
    }

    pub fn rollback_plan(&self) -> Option<&Value> {
        self.rollback_plan.as_ref()
    }

    pub fn target_environment(&self) -> Option<&str> {
        self.target_environment.as_deref()
    }

    /// Number of times `kind` has been invoked in this run
    pub fn attempts(&self, kind: ExecutorKind) -> u32 {
        self.attempts.get(&kind).copied().unwrap_or(0)
    }

    /// Error-recovery retries granted to `kind`
    pub fn retries(&self, kind: ExecutorKind) -> u32 {
        self.retries.get(&kind).copied().unwrap_or(0)
    }

    /// Validation retries granted to `kind`
    pub fn validation_retries(&self, kind: ExecutorKind) -> u32 {
        self.validation_retries.get(&kind).copied().unwrap_or(0)
    }

    pub fn route(&self) -> Option<&RoutePlan> {
        self.route.as_ref()
    }

    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    pub fn error_action(&self) -> Option<ErrorAction> {
        self.error_action
    }

    pub fn interruption(&self) -> Option<&Interruption> {
        self.interruption.as_ref()
    }

    pub fn results(&self) -> Option<&WorkflowResults> {
        self.results.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True once `finalize` has stored the results
    pub fn is_finalized(&self) -> bool {
        self.results.is_some()
    }

    /// Completed on the first try or after a granted retry
    pub fn has_succeeded(&self, kind: ExecutorKind) -> bool {
        self.completed_executors.contains(&kind) || self.recovered_executors.contains(&kind)
    }

    /// Failed executors that have not since recovered
    pub fn unrecovered_failures(&self) -> Vec<ExecutorKind> {
        self.failed_executors
            .iter()
            .copied()
            .filter(|k| !self.recovered_executors.contains(k))
            .collect()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore from JSON produced by [`to_json`](Self::to_json)
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
