//! # opsgraph - Multi-Executor DevOps Orchestrator
//!
//! Routes a free-text operator request ("deploy the app", "scale the
//! cluster") to the executors it needs, runs them in priority order through a
//! bounded state machine, validates the outcome, retries what policy allows,
//! and always hands back a finalized, well-formed result.
//!
//! ## Features
//!
//! - **Keyword routing** - trigger tables per executor with a workflow-type fallback
//! - **Bounded state machine** - `start → route → executors → validate → finalize`,
//!   with `handle_errors` for recovery, capped by a transition budget
//! - **Failure containment** - executor errors, panics and timeouts become state entries
//! - **Cancellation** - a token threaded through every executor call; `finalize` still runs
//! - **Layered config** - defaults, user, project and explicit TOML files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opsgraph::{Context, ExecutorRegistry, Orchestrator};
//!
//! # async fn example() -> opsgraph::Result<()> {
//! let orchestrator = Orchestrator::new(ExecutorRegistry::dry_run())?;
//! let outcome = orchestrator
//!     .run("deployment", "deploy the app", Context::new())
//!     .await;
//!
//! println!("{}", outcome.summary);
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod routing;
pub mod shutdown;
pub mod state;
pub mod version;
pub mod workflow;

mod error;

// Re-export key types for convenience
pub use config::{ConfigLoader, OpsgraphConfig};
pub use executor::{
    CommandExecutor, Context, EchoExecutor, ExecutionResult, ExecutorKind, ExecutorRegistry,
    TaskExecutor,
};
pub use orchestrator::{Orchestrator, WorkflowOutcome};
pub use routing::RoutingPolicy;
pub use shutdown::ShutdownCoordinator;
pub use state::{
    StateManager, WorkflowResults, WorkflowState, WorkflowStatus, WorkflowSummary, WorkflowType,
};
pub use version::VersionInfo;

// Error types
pub use error::{OrchestratorError, Result};
