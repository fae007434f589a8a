//! Graph construction: nodes, edges, validation
//!
//! A [`StateGraph`] is a fixed set of named nodes over a typed state `S`. Each
//! node owns exactly one outgoing [`Edge`], except the finish node, which is
//! terminal. Edges are either direct or conditional; a conditional edge calls a
//! router with the current state and maps the returned branch key to the next
//! node.
//!
//! ```text
//!   entry ──► node A ──(direct)──► node B
//!                                    │
//!                          router(&state) ─┬─ "ok"    ──► finish
//!                                          └─ "retry" ──► node A
//! ```
//!
//! Building is infallible; every structural problem is reported at once by
//! [`StateGraph::validate`], which [`StateGraph::compile`] runs before
//! producing a [`CompiledGraph`].
//!
//! # Example
//!
//! ```rust,ignore
//! use opsgraph_core::{StateGraph, ExecutionLimits};
//!
//! let mut graph = StateGraph::new();
//! graph.add_node("fetch", FetchNode);
//! graph.add_node("store", StoreNode);
//! graph.add_edge("fetch", "store");
//! graph.set_entry_point("fetch");
//! graph.set_finish_point("store");
//!
//! let compiled = graph.compile(ExecutionLimits::default())?;
//! let execution = compiled.invoke(MyState::default()).await;
//! ```

use crate::compiled::{CompiledGraph, ExecutionLimits};
use crate::error::{GraphError, Result};
use crate::interrupt::Interruption;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Node identifier, unique within a graph
pub type NodeId = String;

/// Per-run information handed to every node
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Fires when the caller cancels the run
    pub cancel: CancellationToken,
    /// Instant at which the run deadline passes, if any
    pub deadline: Option<Instant>,
}

impl NodeContext {
    /// Context with no cancellation source and no deadline
    pub fn detached() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Time left before the run deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `limit` clamped to the time left in the run
    pub fn clamp(&self, limit: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => limit.min(remaining),
            None => limit,
        }
    }
}

/// A processing step over the shared state
///
/// Nodes receive the state by mutable reference. Returning `Err` does not stop
/// the run: the driver hands the error to
/// [`GraphState::record_node_error`] and then follows the node's edge as
/// usual, so routers see the recorded failure.
///
/// The driver stops awaiting a node as soon as the run is cancelled or its
/// deadline passes. Nodes that hand work to other tasks or processes should
/// pass `ctx.cancel` along so that work stops too.
#[async_trait]
pub trait Node<S: Send + 'static>: Send + Sync {
    /// Execute the node body
    async fn run(&self, state: &mut S, ctx: &NodeContext) -> Result<()>;
}

/// Hooks the driver uses to record problems in the state itself
///
/// A run never fails as a whole once compiled; anything that goes wrong is
/// written into the state so the finish node can account for it.
pub trait GraphState: Send + 'static {
    /// A node returned an error or panicked
    fn record_node_error(&mut self, node: &str, error: &GraphError);

    /// The driver is about to divert to the finish node
    fn record_interruption(&mut self, interruption: &Interruption);
}

/// Router function for conditional edges; returns a branch key
pub type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Outgoing edge of a node
pub enum Edge<S> {
    /// Unconditional transition
    Direct(NodeId),

    /// Transition chosen at runtime from the state
    Conditional {
        /// Decision function
        router: Router<S>,
        /// Branch key → target node
        branches: HashMap<String, NodeId>,
    },
}

impl<S> Clone for Edge<S> {
    fn clone(&self) -> Self {
        match self {
            Edge::Direct(to) => Edge::Direct(to.clone()),
            Edge::Conditional { router, branches } => Edge::Conditional {
                router: Arc::clone(router),
                branches: branches.clone(),
            },
        }
    }
}

impl<S> std::fmt::Debug for Edge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

impl<S> Edge<S> {
    /// Every node this edge may lead to
    pub fn targets(&self) -> Vec<&NodeId> {
        match self {
            Edge::Direct(to) => vec![to],
            Edge::Conditional { branches, .. } => branches.values().collect(),
        }
    }

    /// Pick the next node for `state`
    pub fn resolve(&self, from: &str, state: &S) -> std::result::Result<NodeId, Interruption> {
        match self {
            Edge::Direct(to) => Ok(to.clone()),
            Edge::Conditional { router, branches } => {
                let branch = router(state);
                branches
                    .get(&branch)
                    .cloned()
                    .ok_or_else(|| Interruption::UnknownBranch {
                        node: from.to_string(),
                        branch,
                    })
            }
        }
    }
}

/// Builder for a typed state machine
pub struct StateGraph<S: Send + 'static> {
    pub(crate) nodes: HashMap<NodeId, Arc<dyn Node<S>>>,
    pub(crate) edges: HashMap<NodeId, Edge<S>>,
    pub(crate) entry: Option<NodeId>,
    pub(crate) finish: Option<NodeId>,
    duplicates: BTreeSet<String>,
}

impl<S: GraphState> StateGraph<S> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            finish: None,
            duplicates: BTreeSet::new(),
        }
    }

    /// Add a node; registering the same id twice is a validation error
    pub fn add_node(&mut self, id: impl Into<NodeId>, node: impl Node<S> + 'static) -> &mut Self {
        let id = id.into();
        if self.nodes.insert(id.clone(), Arc::new(node)).is_some() {
            self.duplicates.insert(id);
        }
        self
    }

    /// Add an unconditional edge, replacing any previous edge of `from`
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    /// Add a conditional edge, replacing any previous edge of `from`
    ///
    /// `branches` lists every key the router may return together with the
    /// node it selects. Keys the router returns that are missing from the
    /// table divert the run to the finish node.
    pub fn add_conditional_edges<F, I, K, V>(
        &mut self,
        from: impl Into<NodeId>,
        router: F,
        branches: I,
    ) -> &mut Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NodeId>,
    {
        let branches = branches
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.edges.insert(
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                branches,
            },
        );
        self
    }

    /// Node where every run begins
    pub fn set_entry_point(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.entry = Some(node.into());
        self
    }

    /// Terminal node; always executed exactly once at the end of a run
    pub fn set_finish_point(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.finish = Some(node.into());
        self
    }

    /// Registered node ids in sorted order
    pub fn node_ids(&self) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
        ids.sort();
        ids
    }

    /// Check the graph structure
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Validation`] if:
    /// - a node id was registered twice
    /// - the entry or finish point is unset or unknown
    /// - an edge leaves or targets an unknown node
    /// - the finish node has an outgoing edge
    /// - any other node lacks an outgoing edge
    pub fn validate(&self) -> Result<()> {
        if let Some(dup) = self.duplicates.iter().next() {
            return Err(GraphError::validation(format!("Duplicate node {}", dup)));
        }

        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| GraphError::validation("Entry point not set"))?;
        if !self.nodes.contains_key(entry) {
            return Err(GraphError::validation(format!(
                "Entry point {} does not exist",
                entry
            )));
        }

        let finish = self
            .finish
            .as_ref()
            .ok_or_else(|| GraphError::validation("Finish point not set"))?;
        if !self.nodes.contains_key(finish) {
            return Err(GraphError::validation(format!(
                "Finish point {} does not exist",
                finish
            )));
        }
        if self.edges.contains_key(finish) {
            return Err(GraphError::validation(format!(
                "Finish point {} must not have outgoing edges",
                finish
            )));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::validation(format!(
                    "Edge source {} does not exist",
                    from
                )));
            }
            for to in edge.targets() {
                if !self.nodes.contains_key(to) {
                    return Err(GraphError::validation(format!(
                        "Edge target {} does not exist",
                        to
                    )));
                }
            }
        }

        for id in self.node_ids() {
            if id != finish && !self.edges.contains_key(id) {
                return Err(GraphError::validation(format!(
                    "Node {} has no outgoing edge",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Validate and freeze the graph
    pub fn compile(self, limits: ExecutionLimits) -> Result<CompiledGraph<S>> {
        self.validate()?;
        if limits.max_transitions == 0 {
            return Err(GraphError::Configuration(
                "max_transitions must be at least 1".to_string(),
            ));
        }

        // validate() guarantees both are set
        let entry = self.entry.unwrap_or_default();
        let finish = self.finish.unwrap_or_default();
        Ok(CompiledGraph::new(self.nodes, self.edges, entry, finish, limits))
    }
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}
