//! Error types for graph construction and node execution
//!
//! All errors implement `std::error::Error` via the `thiserror` crate.
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation         - Graph structure errors (raised by compile)
//! ├── Configuration      - Invalid execution limits
//! ├── NodeExecution      - A node body returned an error
//! ├── NodePanicked       - A node body panicked
//! ├── Timeout            - An operation inside a node exceeded its budget
//! └── Custom             - Application-defined errors
//! ```
//!
//! Only `Validation` and `Configuration` ever reach the caller of
//! [`StateGraph::compile`](crate::StateGraph::compile). Errors raised while a
//! graph is running are handed to the state through
//! [`GraphState::record_node_error`](crate::GraphState::record_node_error) and
//! execution continues along the node's outgoing edge.

use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or running a state graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Graph structure is invalid
    ///
    /// **Common causes**:
    /// - Entry or finish point not set
    /// - Edge pointing at a node that was never added
    /// - A non-terminal node without an outgoing edge
    /// - The same node id registered twice
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// Execution limits are unusable (for example a zero transition budget)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A node body returned an error
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Name of the node that failed
        node: String,
        /// Error message from node execution
        error: String,
    },

    /// A node body panicked; the panic was contained by the driver
    #[error("Node '{node}' panicked: {message}")]
    NodePanicked {
        /// Name of the node that panicked
        node: String,
        /// Panic payload rendered as text
        message: String,
    },

    /// Operation exceeded its time limit
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Custom application-defined error
    #[error("{0}")]
    Custom(String),
}

impl GraphError {
    /// Create a node execution error with context
    ///
    /// ```rust
    /// use opsgraph_core::GraphError;
    ///
    /// let err = GraphError::node_execution("deploy", "registry unreachable");
    /// assert_eq!(err.to_string(), "Node 'deploy' execution failed: registry unreachable");
    /// ```
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Name of the node the error is attributed to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::NodeExecution { node, .. } | Self::NodePanicked { node, .. } => Some(node),
            _ => None,
        }
    }
}
