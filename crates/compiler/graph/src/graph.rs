//! # Graph
//!
//! This module defines the graph container: dense node storage, constant
//! interning, the input accessors passes use, use rewiring for node
//! replacement, and structural validation.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::node::Node;
use crate::operator::{HeapRef, Opcode, Operator};
use crate::types::Type;
use crate::{indent_str, GraphError, GraphResult, NodeId, PrettyPrint};

/// Interning key for compile-time constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstantKey {
    Heap(HeapRef),
    Int32(i32),
}

/// A sea-of-nodes program graph
///
/// Nodes are created through [`Graph::add_node`] and never removed; a
/// replaced node is marked dead and keeps its id, so side tables indexed by
/// [`NodeId`] stay valid across rewrites.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexVec<NodeId, Node>,
    constants: FxHashMap<ConstantKey, NodeId>,
}

impl Graph {
    /// Creates a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id
    ///
    /// Input list lengths must match the operator's arities; this is the one
    /// construction-time invariant everything else relies on.
    pub fn add_node(
        &mut self,
        operator: Operator,
        value_inputs: &[NodeId],
        effect_inputs: &[NodeId],
        control_inputs: &[NodeId],
    ) -> NodeId {
        debug_assert_eq!(operator.value_input_count(), value_inputs.len());
        debug_assert_eq!(operator.effect_input_count(), effect_inputs.len());
        debug_assert_eq!(operator.control_input_count(), control_inputs.len());
        self.nodes
            .push(Node::new(operator, value_inputs, effect_inputs, control_inputs))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn operator(&self, id: NodeId) -> &Operator {
        &self.nodes[id].operator
    }

    pub fn opcode(&self, id: NodeId) -> Opcode {
        self.nodes[id].operator.opcode()
    }

    /// The i-th value input of `id`
    pub fn value_input(&self, id: NodeId, index: usize) -> NodeId {
        self.nodes[id].value_inputs[index]
    }

    /// The i-th effect input of `id`
    pub fn effect_input(&self, id: NodeId, index: usize) -> NodeId {
        self.nodes[id].effect_inputs[index]
    }

    /// The control input of `id`
    pub fn control_input(&self, id: NodeId) -> NodeId {
        self.nodes[id].control_inputs[0]
    }

    pub fn type_of(&self, id: NodeId) -> Type {
        self.nodes[id].ty
    }

    pub fn set_type(&mut self, id: NodeId, ty: Type) {
        self.nodes[id].ty = ty;
    }

    pub fn is_dead(&self, id: NodeId) -> bool {
        self.nodes[id].dead
    }

    pub fn mark_dead(&mut self, id: NodeId) {
        self.nodes[id].dead = true;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterator over all node ids, dead ones included
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.indices()
    }

    // --- Constants ---

    /// Returns the interned node for a heap constant, creating it on first use
    pub fn heap_constant(&mut self, heap_ref: HeapRef) -> NodeId {
        if let Some(&id) = self.constants.get(&ConstantKey::Heap(heap_ref)) {
            return id;
        }
        let id = self.add_node(Operator::HeapConstant(heap_ref), &[], &[], &[]);
        self.set_type(id, Type::INTERNAL);
        self.constants.insert(ConstantKey::Heap(heap_ref), id);
        id
    }

    /// Returns the interned node for an `i32` constant
    pub fn int32_constant(&mut self, value: i32) -> NodeId {
        if let Some(&id) = self.constants.get(&ConstantKey::Int32(value)) {
            return id;
        }
        let id = self.add_node(Operator::Int32Constant(value), &[], &[], &[]);
        self.set_type(id, Type::SIGNED_SMALL);
        self.constants.insert(ConstantKey::Int32(value), id);
        id
    }

    /// The map of plain element backing stores
    pub fn fixed_array_map_constant(&mut self) -> NodeId {
        self.heap_constant(HeapRef::FIXED_ARRAY_MAP)
    }

    /// The map of unboxed-double element backing stores
    pub fn fixed_double_array_map_constant(&mut self) -> NodeId {
        self.heap_constant(HeapRef::FIXED_DOUBLE_ARRAY_MAP)
    }

    /// Replaces the i-th effect input of `node`. Needed to close loop back
    /// edges, which cannot be wired at construction time.
    pub fn replace_effect_input(&mut self, node: NodeId, index: usize, effect: NodeId) {
        self.nodes[node].effect_inputs[index] = effect;
    }

    // --- Use rewiring ---

    /// Redirects the uses of `node`: value uses to `value`, effect uses to
    /// `effect`. Control uses are left alone.
    pub fn replace_with_value(&mut self, node: NodeId, value: NodeId, effect: NodeId) {
        for id in 0..self.nodes.len() {
            let id = NodeId::from_raw(id);
            if id == node {
                continue;
            }
            let current = &mut self.nodes[id];
            for input in &mut current.value_inputs {
                if *input == node {
                    *input = value;
                }
            }
            for input in &mut current.effect_inputs {
                if *input == node {
                    *input = effect;
                }
            }
        }
    }

    /// Redirects every use of `node` (value, effect, and control) to
    /// `replacement`
    pub fn replace_all_uses(&mut self, node: NodeId, replacement: NodeId) {
        for id in 0..self.nodes.len() {
            let id = NodeId::from_raw(id);
            if id == node {
                continue;
            }
            let current = &mut self.nodes[id];
            for input in current
                .value_inputs
                .iter_mut()
                .chain(current.effect_inputs.iter_mut())
                .chain(current.control_inputs.iter_mut())
            {
                if *input == node {
                    *input = replacement;
                }
            }
        }
    }

    // --- Validation ---

    /// Checks the structural invariants of the graph
    pub fn validate(&self) -> GraphResult<()> {
        for (id, node) in self.nodes.iter_enumerated() {
            if node.dead {
                continue;
            }
            let operator = &node.operator;
            for (kind, expected, got) in [
                ("value", operator.value_input_count(), node.value_inputs.len()),
                ("effect", operator.effect_input_count(), node.effect_inputs.len()),
                (
                    "control",
                    operator.control_input_count(),
                    node.control_inputs.len(),
                ),
            ] {
                if expected != got {
                    return Err(GraphError::InputCountMismatch {
                        node: id,
                        kind,
                        expected,
                        got,
                    });
                }
            }
            for &pred in &node.effect_inputs {
                if self.nodes[pred].operator.effect_output_count() == 0 {
                    return Err(GraphError::EffectFromPureNode { node: id, pred });
                }
            }
            if operator.opcode() == Opcode::EffectPhi {
                let control = node.control_inputs[0];
                let control_op = &self.nodes[control].operator;
                if !matches!(control_op.opcode(), Opcode::Merge | Opcode::Loop) {
                    return Err(GraphError::EffectPhiControl {
                        node: id,
                        opcode: control_op.opcode(),
                    });
                }
                if control_op.control_input_count() != node.effect_inputs.len() {
                    return Err(GraphError::EffectPhiArityMismatch {
                        node: id,
                        control,
                        effects: node.effect_inputs.len(),
                        controls: control_op.control_input_count(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl PrettyPrint for Graph {
    fn pretty_print(&self, indent: usize) -> String {
        let mut out = String::new();
        for (id, node) in self.nodes.iter_enumerated() {
            if node.dead {
                continue;
            }
            out.push_str(&indent_str(indent));
            out.push_str(&format!("%{} = {}", id.index(), node.operator));
            let mut sections = Vec::new();
            if !node.value_inputs.is_empty() {
                sections.push(format_inputs("", &node.value_inputs));
            }
            if !node.effect_inputs.is_empty() {
                sections.push(format_inputs("eff ", &node.effect_inputs));
            }
            if !node.control_inputs.is_empty() {
                sections.push(format_inputs("ctl ", &node.control_inputs));
            }
            if !sections.is_empty() {
                out.push_str(&format!("({})", sections.join("; ")));
            }
            out.push('\n');
        }
        out
    }
}

fn format_inputs(label: &str, inputs: &[NodeId]) -> String {
    let inputs = inputs
        .iter()
        .map(|id| format!("%{}", id.index()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{label}{inputs}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::FieldAccess;

    #[test]
    fn constants_are_interned() {
        let mut graph = Graph::new();
        let a = graph.fixed_array_map_constant();
        let b = graph.fixed_array_map_constant();
        assert_eq!(a, b);
        assert_ne!(a, graph.fixed_double_array_map_constant());
        assert_eq!(graph.int32_constant(3), graph.int32_constant(3));
        assert_ne!(graph.int32_constant(3), graph.int32_constant(4));
    }

    #[test]
    fn replace_with_value_splits_edge_classes() {
        let mut graph = Graph::new();
        let start = graph.add_node(Operator::Start, &[], &[], &[]);
        let object = graph.add_node(Operator::Parameter(0), &[], &[], &[]);
        let load = graph.add_node(
            Operator::LoadField(FieldAccess::tagged(8)),
            &[object],
            &[start],
            &[],
        );
        let value = graph.add_node(Operator::Parameter(1), &[], &[], &[]);
        let user = graph.add_node(Operator::Return, &[load], &[load], &[]);

        graph.replace_with_value(load, value, start);
        assert_eq!(value, graph.value_input(user, 0));
        assert_eq!(start, graph.effect_input(user, 0));
    }

    #[test]
    fn validate_rejects_effect_from_pure_node() {
        let mut graph = Graph::new();
        let object = graph.add_node(Operator::Parameter(0), &[], &[], &[]);
        graph.add_node(
            Operator::LoadField(FieldAccess::tagged(8)),
            &[object],
            &[object],
            &[],
        );
        assert!(matches!(
            graph.validate(),
            Err(GraphError::EffectFromPureNode { .. })
        ));
    }

    #[test]
    fn validate_rejects_misshapen_effect_phi() {
        let mut graph = Graph::new();
        let start = graph.add_node(Operator::Start, &[], &[], &[]);
        let merge = graph.add_node(Operator::Merge { input_count: 3 }, &[], &[], &[start, start, start]);
        graph.add_node(
            Operator::EffectPhi { input_count: 2 },
            &[],
            &[start, start],
            &[merge],
        );
        assert!(matches!(
            graph.validate(),
            Err(GraphError::EffectPhiArityMismatch { .. })
        ));
    }
}
