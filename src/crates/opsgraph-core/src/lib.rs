//! # opsgraph-core
//!
//! A small state-machine engine for typed, step-at-a-time workflows.
//!
//! A workflow is a [`StateGraph`] of named [`Node`]s over a state type that
//! implements [`GraphState`]. Nodes mutate the state; edges decide what runs
//! next, either unconditionally or by calling a router on the state. Once
//! compiled, a graph runs any number of times, concurrently if needed, with
//! each run owning its own state.
//!
//! ## Guarantees of a run
//!
//! - Nodes execute one at a time; the only suspension points are inside nodes.
//! - A node error or panic never aborts the run. It is recorded in the state
//!   and the node's edge is followed.
//! - The finish node always executes exactly once, last.
//! - The number of edges followed is bounded by
//!   [`ExecutionLimits::max_transitions`]. Exhausting it, cancelling the
//!   supplied token, or passing the run deadline diverts to the finish node
//!   with an [`Interruption`].
//!
//! ## Quick start
//!
//! ```rust
//! use async_trait::async_trait;
//! use opsgraph_core::{ExecutionLimits, GraphError, GraphState, Interruption, Node, NodeContext, StateGraph};
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: u32,
//!     done: bool,
//! }
//!
//! impl GraphState for Counter {
//!     fn record_node_error(&mut self, _node: &str, _error: &GraphError) {}
//!     fn record_interruption(&mut self, _interruption: &Interruption) {}
//! }
//!
//! struct Increment;
//!
//! #[async_trait]
//! impl Node<Counter> for Increment {
//!     async fn run(&self, state: &mut Counter, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
//!         state.value += 1;
//!         Ok(())
//!     }
//! }
//!
//! struct Done;
//!
//! #[async_trait]
//! impl Node<Counter> for Done {
//!     async fn run(&self, state: &mut Counter, _ctx: &NodeContext) -> opsgraph_core::Result<()> {
//!         state.done = true;
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let mut graph = StateGraph::new();
//! graph.add_node("inc", Increment);
//! graph.add_node("done", Done);
//! graph.add_conditional_edges(
//!     "inc",
//!     |s: &Counter| if s.value < 3 { "again".into() } else { "stop".into() },
//!     [("again", "inc"), ("stop", "done")],
//! );
//! graph.set_entry_point("inc");
//! graph.set_finish_point("done");
//!
//! let compiled = graph.compile(ExecutionLimits::default()).unwrap();
//! let execution = compiled.invoke(Counter::default()).await;
//! assert_eq!(execution.state.value, 3);
//! assert!(execution.state.done);
//! # });
//! # }
//! ```

pub mod compiled;
pub mod error;
pub mod graph;
pub mod interrupt;

pub use compiled::{CompiledGraph, Execution, ExecutionLimits};
pub use error::{GraphError, Result};
pub use graph::{Edge, GraphState, Node, NodeContext, NodeId, Router, StateGraph};
pub use interrupt::Interruption;
pub use tokio_util::sync::CancellationToken;
