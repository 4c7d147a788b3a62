//! # Graph Reduction
//!
//! Passes that rewrite individual nodes implement [`Reducer`] and report
//! what happened through a [`Reduction`] verdict. [`GraphReducer`] drives a
//! reducer over the whole graph until no verdict makes progress.

use tracing::{debug, trace};

use crate::graph::Graph;
use crate::NodeId;

/// The outcome of reducing a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Nothing to do for this node right now
    NoChange,
    /// The node was left in place but information about it progressed;
    /// its successors should be revisited
    Changed(NodeId),
    /// Every use of the node should be redirected to the given node
    Replace(NodeId),
}

/// A per-node rewrite driven by [`GraphReducer`]
pub trait Reducer {
    /// Get the name of this reducer for debugging
    fn name(&self) -> &'static str;

    /// Inspect one node and report a verdict
    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> Reduction;
}

/// Drives a [`Reducer`] over a graph to a fixed point
///
/// Nodes are visited in id order, which for graphs built front-to-back puts
/// effect predecessors before their successors; sweeps repeat until a full
/// sweep produces no verdict other than `NoChange`, so the result does not
/// depend on that ordering.
#[derive(Debug, Default)]
pub struct GraphReducer;

impl GraphReducer {
    pub const fn new() -> Self {
        Self
    }

    /// Runs `reducer` to a fixed point. Returns true if the graph itself was
    /// modified (some node was replaced), not merely revisited.
    pub fn reduce_graph(&mut self, graph: &mut Graph, reducer: &mut dyn Reducer) -> bool {
        let mut graph_modified = false;
        let mut sweeps = 0usize;
        loop {
            let mut progressed = false;
            for node in graph.node_ids().collect::<Vec<_>>() {
                if graph.is_dead(node) {
                    continue;
                }
                match reducer.reduce(graph, node) {
                    Reduction::NoChange => {}
                    Reduction::Changed(_) => {
                        progressed = true;
                    }
                    Reduction::Replace(replacement) => {
                        trace!(
                            reducer = reducer.name(),
                            node = node.index(),
                            replacement = replacement.index(),
                            "replacing node"
                        );
                        graph.replace_all_uses(node, replacement);
                        graph.mark_dead(node);
                        progressed = true;
                        graph_modified = true;
                    }
                }
            }
            sweeps += 1;
            if !progressed {
                break;
            }
        }
        debug!(
            reducer = reducer.name(),
            sweeps, graph_modified, "reduction reached fixed point"
        );
        graph_modified
    }
}
