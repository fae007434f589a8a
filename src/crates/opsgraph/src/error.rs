//! Error types for opsgraph
//!
//! Only construction-time problems surface as `Err`: unreadable config, a
//! routing table that cannot be built, an invalid workflow graph. Once a run
//! has started every failure is captured into the workflow state instead.

use thiserror::Error;

/// Result type alias for opsgraph operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Main error type for opsgraph operations
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An executor raised instead of returning a failure result
    #[error("Executor '{executor}' failed: {message}")]
    Executor { executor: String, message: String },

    /// An executor call exceeded its time limit
    #[error("Executor '{executor}' timed out after {duration_secs} seconds")]
    Timeout { executor: String, duration_secs: u64 },

    /// The call was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Routing table is unusable
    #[error("Routing error: {0}")]
    Routing(String),

    /// Workflow graph could not be built
    #[error(transparent)]
    Graph(#[from] opsgraph_core::GraphError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl OrchestratorError {
    /// Shorthand for an executor failure
    pub fn executor(executor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Executor {
            executor: executor.into(),
            message: message.into(),
        }
    }
}

impl From<String> for OrchestratorError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}

impl From<&str> for OrchestratorError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::Config("missing [routing] priority".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing [routing] priority");

        let err = OrchestratorError::executor("security", "scanner not installed");
        assert_eq!(err.to_string(), "Executor 'security' failed: scanner not installed");

        let err = OrchestratorError::Timeout {
            executor: "infrastructure".to_string(),
            duration_secs: 30,
        };
        assert_eq!(err.to_string(), "Executor 'infrastructure' timed out after 30 seconds");
    }

    #[test]
    fn test_graph_error_conversion() {
        let err: OrchestratorError = opsgraph_core::GraphError::validation("Entry point not set").into();
        assert!(matches!(err, OrchestratorError::Graph(_)));
        assert!(err.to_string().contains("Entry point not set"));
    }

    #[test]
    fn test_from_string() {
        let err: OrchestratorError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
