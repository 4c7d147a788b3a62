//! # Petrel Graph IR
//!
//! This crate defines the sea-of-nodes intermediate representation used by the
//! Petrel compiler backend, together with the optimization passes that run on
//! it. A program is a single directed graph of operation nodes; edges are
//! partitioned into value, effect, and control edges.
//!
//! ## Design Principles
//!
//! 1. **Sea of nodes**: there is no instruction list; ordering between
//!    memory-touching operations is carried by the effect chain alone
//! 2. **Dense identities**: nodes are identified by dense [`NodeId`]s and
//!    stored in an `IndexVec`, so per-node side tables are plain vectors
//! 3. **Variants over virtual dispatch**: operators are a data-carrying enum
//!    and passes dispatch on the opcode
//! 4. **Reduction verdicts**: passes communicate with the graph reducer
//!    through [`Reduction`] verdicts instead of mutating nodes in place
//!
//! ## Architecture
//!
//! ```text
//! Graph
//! nodes: IndexVec<NodeId, Node>
//! interned constants
//!
//! Node
//! operator: Operator
//! value/effect/control inputs
//! type, liveness
//! ```
//!
//! Passes implement [`Reducer`] and are driven to a fixed point by
//! [`GraphReducer`]; [`PassManager`] sequences whole passes.

pub use graph::Graph;
pub use node::Node;
pub use operator::{
    BaseTaggedness, ElementAccess, ElementsTransition, FieldAccess, GrowFastElementsFlags, HeapRef,
    MachineRepresentation, Opcode, Operator, OperatorProperties,
};
pub use passes::load_elimination::LoadElimination;
pub use passes::{GraphPass, PassManager, Validation};
pub use reducer::{GraphReducer, Reducer, Reduction};
pub use types::Type;

pub mod graph;
pub mod node;
pub mod operator;
pub mod passes;
pub mod reducer;
pub mod testing;
pub mod types;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Unique identifier for a node within a graph
    pub struct NodeId = usize;
}

// --- Error Types ---

/// Represents a structural error detected by graph validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An input list does not match the arity of the node's operator
    #[error("node {node:?} has {got} {kind} inputs but its operator expects {expected}")]
    InputCountMismatch {
        node: NodeId,
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    /// A node takes its effect from a node that produces no effect
    #[error("node {node:?} takes its effect from {pred:?}, which has no effect output")]
    EffectFromPureNode { node: NodeId, pred: NodeId },

    /// An effect phi is controlled by something other than a merge or loop
    #[error("effect phi {node:?} is controlled by {opcode:?}, expected Merge or Loop")]
    EffectPhiControl { node: NodeId, opcode: Opcode },

    /// An effect phi's arity disagrees with its control node's arity
    #[error(
        "effect phi {node:?} has {effects} effect inputs but its control \
         {control:?} merges {controls} predecessors"
    )]
    EffectPhiArityMismatch {
        node: NodeId,
        control: NodeId,
        effects: usize,
        controls: usize,
    },
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

// --- Pretty Printing Support ---

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
