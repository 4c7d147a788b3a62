//! # Testing Utilities
//!
//! Builder helpers for constructing graphs in unit and integration tests.
//! Every helper appends a node wired the way the corresponding operator
//! expects and returns its id; the effect chain is threaded explicitly so
//! tests stay honest about ordering.

use crate::graph::Graph;
use crate::operator::{
    ElementAccess, ElementsTransition, FieldAccess, GrowFastElementsFlags, HeapRef, Operator,
};
use crate::types::Type;
use crate::NodeId;

/// Builder for creating test graphs
pub struct GraphBuilder {
    graph: Graph,
    start: NodeId,
}

impl GraphBuilder {
    /// Creates a builder over a fresh graph containing only a start node
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let start = graph.add_node(Operator::Start, &[], &[], &[]);
        Self { graph, start }
    }

    /// The start node; root of the effect and control chains
    pub const fn start(&self) -> NodeId {
        self.start
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn set_type(&mut self, node: NodeId, ty: Type) {
        self.graph.set_type(node, ty);
    }

    pub fn parameter(&mut self, index: u32) -> NodeId {
        self.graph
            .add_node(Operator::Parameter(index), &[], &[], &[])
    }

    pub fn typed_parameter(&mut self, index: u32, ty: Type) -> NodeId {
        let node = self.parameter(index);
        self.graph.set_type(node, ty);
        node
    }

    pub fn heap_constant(&mut self, heap_ref: HeapRef) -> NodeId {
        self.graph.heap_constant(heap_ref)
    }

    pub fn int32_constant(&mut self, value: i32) -> NodeId {
        self.graph.int32_constant(value)
    }

    pub fn allocate(&mut self, size: NodeId, effect: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::Allocate, &[size], &[effect], &[])
    }

    pub fn finish_region(&mut self, object: NodeId, effect: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::FinishRegion, &[object], &[effect], &[])
    }

    pub fn check_maps(&mut self, object: NodeId, maps: &[NodeId], effect: NodeId) -> NodeId {
        let mut value_inputs = vec![object];
        value_inputs.extend_from_slice(maps);
        self.graph.add_node(
            Operator::CheckMaps {
                map_count: maps.len() as u32,
            },
            &value_inputs,
            &[effect],
            &[],
        )
    }

    pub fn ensure_writable_fast_elements(
        &mut self,
        object: NodeId,
        elements: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::EnsureWritableFastElements,
            &[object, elements],
            &[effect],
            &[],
        )
    }

    pub fn maybe_grow_fast_elements(
        &mut self,
        flags: GrowFastElementsFlags,
        object: NodeId,
        elements: NodeId,
        index: NodeId,
        length: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::MaybeGrowFastElements(flags),
            &[object, elements, index, length],
            &[effect],
            &[],
        )
    }

    pub fn transition_elements_kind(
        &mut self,
        transition: ElementsTransition,
        object: NodeId,
        source_map: NodeId,
        target_map: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::TransitionElementsKind(transition),
            &[object, source_map, target_map],
            &[effect],
            &[],
        )
    }

    pub fn load_field(&mut self, access: FieldAccess, object: NodeId, effect: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::LoadField(access), &[object], &[effect], &[])
    }

    pub fn store_field(
        &mut self,
        access: FieldAccess,
        object: NodeId,
        value: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph
            .add_node(Operator::StoreField(access), &[object, value], &[effect], &[])
    }

    pub fn load_element(
        &mut self,
        access: ElementAccess,
        object: NodeId,
        index: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph
            .add_node(Operator::LoadElement(access), &[object, index], &[effect], &[])
    }

    pub fn store_element(
        &mut self,
        access: ElementAccess,
        object: NodeId,
        index: NodeId,
        value: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::StoreElement(access),
            &[object, index, value],
            &[effect],
            &[],
        )
    }

    pub fn store_typed_element(
        &mut self,
        buffer: NodeId,
        base: NodeId,
        external: NodeId,
        index: NodeId,
        value: NodeId,
        effect: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::StoreTypedElement,
            &[buffer, base, external, index, value],
            &[effect],
            &[],
        )
    }

    pub fn call(&mut self, args: &[NodeId], effect: NodeId) -> NodeId {
        self.graph.add_node(
            Operator::Call {
                arg_count: args.len() as u32,
            },
            args,
            &[effect],
            &[],
        )
    }

    pub fn merge(&mut self, controls: &[NodeId]) -> NodeId {
        self.graph.add_node(
            Operator::Merge {
                input_count: controls.len() as u32,
            },
            &[],
            &[],
            controls,
        )
    }

    pub fn loop_header(&mut self, controls: &[NodeId]) -> NodeId {
        self.graph.add_node(
            Operator::Loop {
                input_count: controls.len() as u32,
            },
            &[],
            &[],
            controls,
        )
    }

    pub fn effect_phi(&mut self, effects: &[NodeId], control: NodeId) -> NodeId {
        self.graph.add_node(
            Operator::EffectPhi {
                input_count: effects.len() as u32,
            },
            &[],
            effects,
            &[control],
        )
    }

    pub fn return_node(&mut self, value: NodeId, effect: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::Return, &[value], &[effect], &[])
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
