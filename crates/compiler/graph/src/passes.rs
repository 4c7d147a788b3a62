//! # Graph Optimization Passes
//!
//! This module implements the pass infrastructure: the [`GraphPass`] trait,
//! conditional execution, and a [`PassManager`] that runs passes in sequence.

pub mod load_elimination;

pub use load_elimination::LoadElimination;

use tracing::{debug, error};

use crate::graph::Graph;
use crate::operator::Opcode;

/// Analyzes a graph to determine if it contains memory operations that the
/// load-elimination pass could act on.
pub fn graph_uses_memory(graph: &Graph) -> bool {
    graph.node_ids().any(|id| {
        matches!(
            graph.opcode(id),
            Opcode::LoadField
                | Opcode::StoreField
                | Opcode::LoadElement
                | Opcode::StoreElement
                | Opcode::CheckMaps
                | Opcode::EnsureWritableFastElements
                | Opcode::MaybeGrowFastElements
                | Opcode::TransitionElementsKind
        )
    })
}

/// A trait for graph optimization passes
pub trait GraphPass {
    /// Apply this pass to a graph
    /// Returns true if the graph was modified
    fn run(&mut self, graph: &mut Graph) -> bool;

    /// Get the name of this pass for debugging
    fn name(&self) -> &'static str;
}

/// A wrapper for conditional pass execution
///
/// This allows passes to be skipped based on graph characteristics, saving
/// compile time on graphs that cannot benefit from certain optimizations.
pub struct ConditionalPass {
    pass: Box<dyn GraphPass>,
    condition: fn(&Graph) -> bool,
}

impl ConditionalPass {
    /// Create a new conditional pass
    pub fn new(pass: Box<dyn GraphPass>, condition: fn(&Graph) -> bool) -> Self {
        Self { pass, condition }
    }
}

impl GraphPass for ConditionalPass {
    fn run(&mut self, graph: &mut Graph) -> bool {
        if (self.condition)(graph) {
            self.pass.run(graph)
        } else {
            false
        }
    }

    fn name(&self) -> &'static str {
        self.pass.name()
    }
}

/// Graph Validation Pass
///
/// Checks the structural invariants of the graph and reports violations.
/// Useful to run before and after other passes; never modifies the graph.
#[derive(Debug, Default)]
pub struct Validation;

impl Validation {
    pub const fn new() -> Self {
        Self
    }
}

impl GraphPass for Validation {
    fn run(&mut self, graph: &mut Graph) -> bool {
        if let Err(err) = graph.validate() {
            error!(%err, "graph validation failed");
        }
        false
    }

    fn name(&self) -> &'static str {
        "Validation"
    }
}

/// A pass manager that can run multiple passes in sequence
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn GraphPass>>,
}

impl PassManager {
    /// Create a new pass manager
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add a pass to the manager
    pub fn add_pass<P: GraphPass + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Add a conditional pass to the manager
    /// The pass will only run if the condition function returns true
    pub fn add_conditional_pass<P: GraphPass + 'static>(
        mut self,
        pass: P,
        condition: fn(&Graph) -> bool,
    ) -> Self {
        self.passes
            .push(Box::new(ConditionalPass::new(Box::new(pass), condition)));
        self
    }

    /// Run all passes on the graph
    /// Returns true if any pass modified the graph
    pub fn run(&mut self, graph: &mut Graph) -> bool {
        let mut modified = false;

        for pass in &mut self.passes {
            if pass.run(graph) {
                modified = true;
                debug!(pass = pass.name(), "pass modified graph");
            }
        }

        modified
    }

    /// Create the standard optimization pipeline
    ///
    /// Load elimination only runs when the graph contains memory operations
    /// it could act on.
    pub fn standard_pipeline() -> Self {
        Self::new()
            .add_pass(Validation::new())
            .add_conditional_pass(LoadElimination::new(), graph_uses_memory)
            .add_pass(Validation::new())
    }
}
