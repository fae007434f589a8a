//! Configuration management for opsgraph
//!
//! Layered TOML configuration: defaults, user-level, project-level, explicit file.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    ExecutorConfig, LoggingConfig, OpsgraphConfig, OrchestratorConfig, RecoveryConfig,
    RoutingConfig,
};
