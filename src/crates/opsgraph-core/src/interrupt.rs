//! Reasons a run left its normal path
//!
//! When the driver has to stop following edges it jumps straight to the
//! graph's finish node and tells the state why, through
//! [`GraphState::record_interruption`](crate::GraphState::record_interruption).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the driver diverted a run to the finish node
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interruption {
    /// The transition budget ran out before the finish node was reached
    #[error("transition limit of {limit} reached after node '{node}'")]
    TransitionLimit {
        /// Last node that executed
        node: String,
        /// Configured budget
        limit: usize,
    },

    /// The caller cancelled the run while `node` was executing
    #[error("run cancelled during node '{node}'")]
    Cancelled {
        /// Node that was executing (or about to execute)
        node: String,
    },

    /// The run-level deadline passed while `node` was executing
    #[error("run deadline of {timeout_ms}ms exceeded during node '{node}'")]
    DeadlineExceeded {
        /// Node that was executing
        node: String,
        /// Configured run timeout
        timeout_ms: u64,
    },

    /// A router returned a branch key that is not in its branch table
    #[error("node '{node}' routed to unknown branch '{branch}'")]
    UnknownBranch {
        /// Node whose router misbehaved
        node: String,
        /// Branch key the router returned
        branch: String,
    },

    /// A node had no outgoing edge
    #[error("node '{node}' has no outgoing edge")]
    DeadEnd {
        /// Node without an edge
        node: String,
    },
}

impl Interruption {
    /// Node at which the interruption happened
    pub fn node(&self) -> &str {
        match self {
            Self::TransitionLimit { node, .. }
            | Self::Cancelled { node }
            | Self::DeadlineExceeded { node, .. }
            | Self::UnknownBranch { node, .. }
            | Self::DeadEnd { node } => node,
        }
    }

    /// True when the interruption came from outside the graph (cancel or deadline)
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruption_node_and_kind() {
        let limit = Interruption::TransitionLimit {
            node: "validate".to_string(),
            limit: 14,
        };
        assert_eq!(limit.node(), "validate");
        assert!(!limit.is_external());

        let cancelled = Interruption::Cancelled {
            node: "build".to_string(),
        };
        assert!(cancelled.is_external());
        assert_eq!(cancelled.to_string(), "run cancelled during node 'build'");
    }
}
