//! Keyword routing from a request to the executors it needs
//!
//! Each executor has a list of trigger keywords. A request needs every
//! executor with at least one trigger appearing (case-insensitively) in its
//! text. Matches are ordered by a fixed priority list, never by match order.
//! When nothing matches, a fallback table keyed by workflow type decides.
//!
//! Routing is best effort. A misrouted request is caught later by the
//! `validate` node rather than prevented here.

use crate::config::RoutingConfig;
use crate::error::{OrchestratorError, Result};
use crate::executor::ExecutorKind;
use crate::state::{RoutePlan, WorkflowType};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Trigger, priority and fallback tables; read-only once built
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingPolicy {
    triggers: BTreeMap<ExecutorKind, Vec<String>>,
    priority: Vec<ExecutorKind>,
    fallback: HashMap<String, Vec<ExecutorKind>>,
    default_fallback: Vec<ExecutorKind>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        let triggers = BTreeMap::from([
            (
                ExecutorKind::Build,
                words(&["build", "deploy", "pipeline", "ci/cd", "release"]),
            ),
            (
                ExecutorKind::Infrastructure,
                words(&["infrastructure", "terraform", "kubernetes", "cluster", "provision", "scale"]),
            ),
            (
                ExecutorKind::Security,
                words(&["security", "vulnerability", "compliance", "audit", "scan", "secret"]),
            ),
            (
                ExecutorKind::Testing,
                words(&["test", "coverage", "quality", "performance", "load"]),
            ),
        ]);

        let fallback = HashMap::from([
            (
                "deployment".to_string(),
                vec![ExecutorKind::Build, ExecutorKind::Infrastructure, ExecutorKind::Security],
            ),
            ("security".to_string(), vec![ExecutorKind::Security]),
            ("testing".to_string(), vec![ExecutorKind::Testing]),
            ("infrastructure".to_string(), vec![ExecutorKind::Infrastructure]),
        ]);

        Self {
            triggers,
            priority: ExecutorKind::ALL.to_vec(),
            fallback,
            default_fallback: vec![ExecutorKind::Build],
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn parse_kinds(names: &[String], field: &str) -> Result<Vec<ExecutorKind>> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind: ExecutorKind = name
            .parse()
            .map_err(|e| OrchestratorError::Routing(format!("{} in {}", e, field)))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

impl RoutingPolicy {
    /// Build from the `[routing]` config section
    ///
    /// Sections left empty keep the built-in tables.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Routing`] if any table names an unknown
    /// executor.
    pub fn from_config(config: &RoutingConfig) -> Result<Self> {
        let mut policy = Self::default();

        if !config.priority.is_empty() {
            let mut priority = parse_kinds(&config.priority, "routing.priority")?;
            // Unlisted executors keep their natural order after the listed ones
            for kind in ExecutorKind::ALL {
                if !priority.contains(&kind) {
                    priority.push(kind);
                }
            }
            policy.priority = priority;
        }

        for (name, keywords) in &config.triggers {
            let kind: ExecutorKind = name
                .parse()
                .map_err(|e| OrchestratorError::Routing(format!("{} in routing.triggers", e)))?;
            policy
                .triggers
                .insert(kind, keywords.iter().map(|k| k.to_lowercase()).collect());
        }

        for (workflow_type, names) in &config.fallback {
            let kinds = parse_kinds(names, "routing.fallback")?;
            policy
                .fallback
                .insert(WorkflowType::from(workflow_type.as_str()).to_string(), kinds);
        }

        if let Some(default_fallback) = &config.default_fallback {
            policy.default_fallback = parse_kinds(default_fallback, "routing.default_fallback")?;
        }

        Ok(policy)
    }

    /// Executors whose triggers appear in `request`, in priority order
    pub fn matches(&self, request: &str) -> Vec<ExecutorKind> {
        let lowered = request.to_lowercase();
        let mut matched: Vec<ExecutorKind> = self
            .triggers
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(kind, _)| *kind)
            .collect();
        matched.sort_by_key(|kind| self.rank(*kind));
        matched
    }

    /// Fallback list for `workflow_type`
    pub fn fallback_for(&self, workflow_type: &WorkflowType) -> &[ExecutorKind] {
        self.fallback
            .get(workflow_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&self.default_fallback)
    }

    /// Classify a request
    ///
    /// The plan's `required` list is empty only when no trigger matched and
    /// the fallback for the workflow type is empty.
    pub fn plan(&self, request: &str, workflow_type: &WorkflowType) -> RoutePlan {
        let matched = self.matches(request);
        let plan = if matched.is_empty() {
            RoutePlan::new(self.fallback_for(workflow_type).to_vec(), true)
        } else {
            RoutePlan::new(matched, false)
        };
        debug!(
            workflow_type = %workflow_type,
            required = ?plan.required,
            strategy = ?plan.strategy,
            fallback = plan.fallback,
            "Request routed"
        );
        plan
    }

    pub fn priority(&self) -> &[ExecutorKind] {
        &self.priority
    }

    pub fn triggers(&self, kind: ExecutorKind) -> &[String] {
        self.triggers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn rank(&self, kind: ExecutorKind) -> usize {
        self.priority
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.priority.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RoutingStrategy;

    #[test]
    fn test_single_match() {
        let policy = RoutingPolicy::default();
        let plan = policy.plan("run a vulnerability scan", &WorkflowType::Security);
        assert_eq!(plan.required, vec![ExecutorKind::Security]);
        assert_eq!(plan.strategy, RoutingStrategy::Single);
        assert!(!plan.fallback);
    }

    #[test]
    fn test_multiple_matches_use_priority_order() {
        let policy = RoutingPolicy::default();
        let plan = policy.plan("Run TESTS then deploy to the cluster", &WorkflowType::Generic);
        assert_eq!(
            plan.required,
            vec![ExecutorKind::Build, ExecutorKind::Infrastructure, ExecutorKind::Testing]
        );
        assert_eq!(plan.strategy, RoutingStrategy::Sequential);
    }

    #[test]
    fn test_fallback_by_workflow_type() {
        let policy = RoutingPolicy::default();

        let plan = policy.plan("do the thing", &WorkflowType::Deployment);
        assert!(plan.fallback);
        assert_eq!(
            plan.required,
            vec![ExecutorKind::Build, ExecutorKind::Infrastructure, ExecutorKind::Security]
        );

        let plan = policy.plan("hello there", &WorkflowType::from("unknown"));
        assert_eq!(plan.required, vec![ExecutorKind::Build]);
    }

    #[test]
    fn test_custom_priority_reorders() {
        let config = RoutingConfig {
            priority: vec!["security".to_string(), "build".to_string()],
            ..RoutingConfig::default()
        };
        let policy = RoutingPolicy::from_config(&config).unwrap();
        let plan = policy.plan("deploy after a security audit", &WorkflowType::Generic);
        assert_eq!(plan.required, vec![ExecutorKind::Security, ExecutorKind::Build]);
        assert_eq!(policy.priority().len(), 4);
    }

    #[test]
    fn test_custom_triggers_and_fallback() {
        let mut config = RoutingConfig::default();
        config
            .triggers
            .insert("testing".to_string(), vec!["Smoke".to_string()]);
        config
            .fallback
            .insert("release".to_string(), vec!["build".to_string(), "testing".to_string()]);
        config.default_fallback = Some(vec![]);

        let policy = RoutingPolicy::from_config(&config).unwrap();
        assert_eq!(policy.matches("run smoke checks"), vec![ExecutorKind::Testing]);
        assert!(policy.matches("run a load test").is_empty());

        let plan = policy.plan("nothing relevant", &WorkflowType::from("release"));
        assert_eq!(plan.required, vec![ExecutorKind::Build, ExecutorKind::Testing]);

        let plan = policy.plan("nothing relevant", &WorkflowType::Generic);
        assert!(plan.required.is_empty());
    }

    #[test]
    fn test_unknown_executor_rejected() {
        let config = RoutingConfig {
            priority: vec!["deployer".to_string()],
            ..RoutingConfig::default()
        };
        let err = RoutingPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, OrchestratorError::Routing(_)));
    }
}
