//! # Nodes
//!
//! A node is an operator applied to other nodes. Inputs are stored
//! partitioned by edge class (value, effect, control) so that passes walking
//! one chain never have to skip over the others.

use smallvec::SmallVec;

use crate::operator::Operator;
use crate::types::Type;
use crate::NodeId;

/// A single vertex of the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) operator: Operator,
    pub(crate) value_inputs: SmallVec<[NodeId; 2]>,
    pub(crate) effect_inputs: SmallVec<[NodeId; 1]>,
    pub(crate) control_inputs: SmallVec<[NodeId; 1]>,
    pub(crate) ty: Type,
    pub(crate) dead: bool,
}

impl Node {
    pub(crate) fn new(
        operator: Operator,
        value_inputs: &[NodeId],
        effect_inputs: &[NodeId],
        control_inputs: &[NodeId],
    ) -> Self {
        Self {
            operator,
            value_inputs: SmallVec::from_slice(value_inputs),
            effect_inputs: SmallVec::from_slice(effect_inputs),
            control_inputs: SmallVec::from_slice(control_inputs),
            ty: Type::ANY,
            dead: false,
        }
    }

    pub const fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn value_inputs(&self) -> &[NodeId] {
        &self.value_inputs
    }

    pub fn effect_inputs(&self) -> &[NodeId] {
        &self.effect_inputs
    }

    pub fn control_inputs(&self) -> &[NodeId] {
        &self.control_inputs
    }

    pub const fn ty(&self) -> Type {
        self.ty
    }

    pub const fn is_dead(&self) -> bool {
        self.dead
    }
}
