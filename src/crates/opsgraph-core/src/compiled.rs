//! Execution driver for compiled graphs
//!
//! A [`CompiledGraph`] walks its nodes one at a time starting at the entry
//! point. After each node it follows that node's edge, counting transitions.
//! The run always ends by executing the finish node exactly once, whether it
//! was reached through an edge or by diversion:
//!
//! - the transition budget is exhausted,
//! - the caller's [`CancellationToken`] fires,
//! - the run deadline passes, or
//! - a router returns an unknown branch.
//!
//! Node bodies that return `Err` or panic are contained; the failure is
//! written into the state via [`GraphState::record_node_error`] and the edge
//! is followed normally.

use crate::error::GraphError;
use crate::graph::{Edge, GraphState, Node, NodeContext, NodeId};
use crate::interrupt::Interruption;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Bounds applied to every run of a compiled graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum number of edges followed before diverting to the finish node
    pub max_transitions: usize,
    /// Optional wall-clock budget for the whole run
    pub timeout: Option<Duration>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_transitions: 25,
            timeout: None,
        }
    }
}

impl ExecutionLimits {
    /// Limits with the given transition budget and no deadline
    pub fn with_max_transitions(max_transitions: usize) -> Self {
        Self {
            max_transitions,
            timeout: None,
        }
    }

    /// Set the run deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct Execution<S> {
    /// Final state, after the finish node ran
    pub state: S,
    /// Nodes in the order they executed, finish node included
    pub path: Vec<NodeId>,
    /// Edges followed
    pub transitions: usize,
    /// Set when the run was diverted to the finish node
    pub interruption: Option<Interruption>,
}

impl<S> Execution<S> {
    /// True when the finish node was reached through the graph's own edges
    pub fn reached_naturally(&self) -> bool {
        self.interruption.is_none()
    }
}

enum Step {
    Done,
    Interrupted(Interruption),
}

/// A validated, immutable graph ready to run
///
/// Cheap to share behind an `Arc`; every run owns its own state so concurrent
/// runs do not interfere.
pub struct CompiledGraph<S: Send + 'static> {
    nodes: HashMap<NodeId, Arc<dyn Node<S>>>,
    edges: HashMap<NodeId, Edge<S>>,
    entry: NodeId,
    finish: NodeId,
    limits: ExecutionLimits,
}

impl<S: GraphState> CompiledGraph<S> {
    pub(crate) fn new(
        nodes: HashMap<NodeId, Arc<dyn Node<S>>>,
        edges: HashMap<NodeId, Edge<S>>,
        entry: NodeId,
        finish: NodeId,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            nodes,
            edges,
            entry,
            finish,
            limits,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn finish(&self) -> &str {
        &self.finish
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Run to completion without external cancellation
    pub async fn invoke(&self, state: S) -> Execution<S> {
        self.invoke_with_cancel(state, CancellationToken::new()).await
    }

    /// Run to completion, diverting to the finish node if `cancel` fires
    pub async fn invoke_with_cancel(&self, mut state: S, cancel: CancellationToken) -> Execution<S> {
        let deadline = self.limits.timeout.map(|t| Instant::now() + t);
        let ctx = NodeContext {
            cancel: cancel.clone(),
            deadline,
        };
        let mut path = Vec::new();
        let mut transitions = 0usize;
        let mut interruption = None;
        let mut current = self.entry.clone();

        while current != self.finish {
            if cancel.is_cancelled() {
                interruption = Some(Interruption::Cancelled {
                    node: current.clone(),
                });
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    interruption = Some(self.deadline_exceeded(&current));
                    break;
                }
            }

            path.push(current.clone());
            if let Step::Interrupted(i) = self
                .run_node(&current, &mut state, &ctx)
                .await
            {
                interruption = Some(i);
                break;
            }

            let next = match self.edges.get(&current) {
                Some(edge) => edge.resolve(&current, &state),
                None => Err(Interruption::DeadEnd {
                    node: current.clone(),
                }),
            };
            let next = match next {
                Ok(next) => next,
                Err(i) => {
                    interruption = Some(i);
                    break;
                }
            };

            if next != self.finish && transitions >= self.limits.max_transitions {
                interruption = Some(Interruption::TransitionLimit {
                    node: current.clone(),
                    limit: self.limits.max_transitions,
                });
                break;
            }

            debug!(from = %current, to = %next, transitions, "Following edge");
            transitions += 1;
            current = next;
        }

        if let Some(i) = &interruption {
            warn!(node = i.node(), reason = %i, "Diverting run to finish node");
            state.record_interruption(i);
        }

        // The finish node runs to completion regardless of cancel or deadline
        path.push(self.finish.clone());
        if let Some(node) = self.nodes.get(&self.finish) {
            let outcome = AssertUnwindSafe(node.run(&mut state, &NodeContext::detached()))
                .catch_unwind()
                .await;
            Self::record_outcome(&self.finish, &mut state, outcome);
        }

        Execution {
            state,
            path,
            transitions,
            interruption,
        }
    }

    async fn run_node(
        &self,
        id: &str,
        state: &mut S,
        ctx: &NodeContext,
    ) -> Step {
        let Some(node) = self.nodes.get(id) else {
            return Step::Interrupted(Interruption::DeadEnd {
                node: id.to_string(),
            });
        };

        debug!(node = %id, "Entering node");
        let outcome = {
            let fut = AssertUnwindSafe(node.run(state, ctx)).catch_unwind();
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                _ = wait_for(ctx.deadline) => Some(None),
                outcome = fut => Some(Some(outcome)),
            }
        };

        match outcome {
            None => Step::Interrupted(Interruption::Cancelled {
                node: id.to_string(),
            }),
            Some(None) => Step::Interrupted(self.deadline_exceeded(id)),
            Some(Some(outcome)) => {
                Self::record_outcome(id, state, outcome);
                Step::Done
            }
        }
    }

    fn record_outcome(
        id: &str,
        state: &mut S,
        outcome: std::thread::Result<crate::error::Result<()>>,
    ) {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(node = %id, error = %e, "Node returned an error");
                state.record_node_error(id, &e);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(node = %id, panic = %message, "Node panicked");
                state.record_node_error(
                    id,
                    &GraphError::NodePanicked {
                        node: id.to_string(),
                        message,
                    },
                );
            }
        }
    }

    fn deadline_exceeded(&self, node: &str) -> Interruption {
        Interruption::DeadlineExceeded {
            node: node.to_string(),
            timeout_ms: self
                .limits
                .timeout
                .map(|t| t.as_millis() as u64)
                .unwrap_or_default(),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_transitions, 25);
        assert!(limits.timeout.is_none());
    }

    #[test]
    fn test_limits_builder() {
        let limits = ExecutionLimits::with_max_transitions(14).with_timeout(Duration::from_secs(5));
        assert_eq!(limits.max_transitions, 14);
        assert_eq!(limits.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_panic_message_variants() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_payload.as_ref()), "boom");

        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(owned_payload.as_ref()), "kaboom");

        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
