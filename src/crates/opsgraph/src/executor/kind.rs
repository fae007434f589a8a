//! Closed set of executor identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the task executors the orchestrator can sequence
///
/// The declaration order is the routing priority order: when a request needs
/// several executors they run build first, testing last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExecutorKind {
    /// Build, release and deployment pipelines
    Build,
    /// Provisioning, scaling and cluster management
    Infrastructure,
    /// Vulnerability scans, audits, compliance checks
    Security,
    /// Test suites, coverage, performance and quality analysis
    Testing,
}

impl ExecutorKind {
    /// Every executor, in priority order
    pub const ALL: [ExecutorKind; 4] = [
        ExecutorKind::Build,
        ExecutorKind::Infrastructure,
        ExecutorKind::Security,
        ExecutorKind::Testing,
    ];

    /// Canonical name, also used as the graph node id
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Infrastructure => "infrastructure",
            Self::Security => "security",
            Self::Testing => "testing",
        }
    }

    /// Parse a node id back into an executor, if it is one
    pub fn from_node(node: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == node)
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "build" | "cicd" | "ci/cd" | "release" => Ok(Self::Build),
            "infrastructure" | "infra" => Ok(Self::Infrastructure),
            "security" => Ok(Self::Security),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(format!("Unknown executor: {}", other)),
        }
    }
}

impl TryFrom<String> for ExecutorKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExecutorKind> for String {
    fn from(kind: ExecutorKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("cicd".parse::<ExecutorKind>().unwrap(), ExecutorKind::Build);
        assert_eq!("Infra".parse::<ExecutorKind>().unwrap(), ExecutorKind::Infrastructure);
        assert_eq!("test".parse::<ExecutorKind>().unwrap(), ExecutorKind::Testing);
        assert!("deployer".parse::<ExecutorKind>().is_err());
    }

    #[test]
    fn test_priority_order() {
        let mut kinds = vec![ExecutorKind::Testing, ExecutorKind::Build, ExecutorKind::Security];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![ExecutorKind::Build, ExecutorKind::Security, ExecutorKind::Testing]
        );
    }

    #[test]
    fn test_node_ids_round_trip() {
        for kind in ExecutorKind::ALL {
            assert_eq!(ExecutorKind::from_node(kind.as_str()), Some(kind));
        }
        assert_eq!(ExecutorKind::from_node("validate"), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ExecutorKind::Security).unwrap();
        assert_eq!(json, "\"security\"");
        let back: ExecutorKind = serde_json::from_str("\"cicd\"").unwrap();
        assert_eq!(back, ExecutorKind::Build);
    }
}
