//! # Operators
//!
//! This module defines the operators a node can carry. An [`Operator`] is a
//! data-carrying enum: the variant is the opcode and the payload holds the
//! static parameters of the operation (field accesses, transition kinds,
//! input arities). Passes dispatch on the fieldless [`Opcode`] mirror and
//! read parameters through the typed accessors.

bitflags::bitflags! {
    /// Static properties of an operator, used by passes to reason about
    /// effects without knowing the concrete opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperatorProperties: u8 {
        /// The operation never mutates observable memory
        const NO_WRITE = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Flags for the `MaybeGrowFastElements` operator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GrowFastElementsFlags: u8 {
        /// The object is a language-level array with a separate length field
        const ARRAY_OBJECT = 1 << 0;
        /// The grown backing store holds unboxed doubles
        const DOUBLE_ELEMENTS = 1 << 1;
    }
}

/// The machine-level representation of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineRepresentation {
    None,
    Bit,
    Word8,
    Word16,
    Word32,
    Word64,
    Float32,
    Float64,
    Simd128,
    TaggedSigned,
    TaggedPointer,
    Tagged,
}

impl MachineRepresentation {
    /// The representation of a native pointer on the target
    pub const POINTER: Self = Self::Word64;
}

/// Size in bytes of a native pointer on the target
pub const POINTER_SIZE: i32 = 8;

/// Whether a memory access is relative to a tagged base pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTaggedness {
    Untagged,
    Tagged,
}

/// Describes a named-field access: base kind, byte offset, representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldAccess {
    pub base_is_tagged: BaseTaggedness,
    pub offset: i32,
    pub representation: MachineRepresentation,
}

impl FieldAccess {
    /// A tagged, pointer-aligned field at the given byte offset
    pub const fn tagged(offset: i32) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            offset,
            representation: MachineRepresentation::Tagged,
        }
    }

    /// Same as [`FieldAccess::tagged`] with an explicit representation
    pub const fn with_representation(offset: i32, representation: MachineRepresentation) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            offset,
            representation,
        }
    }
}

/// Describes an indexed-element access into a backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementAccess {
    pub base_is_tagged: BaseTaggedness,
    pub header_size: i32,
    pub representation: MachineRepresentation,
}

impl ElementAccess {
    /// A tagged element access with the standard backing-store header
    pub const fn tagged() -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            header_size: 2 * POINTER_SIZE,
            representation: MachineRepresentation::Tagged,
        }
    }

    /// Same as [`ElementAccess::tagged`] with an explicit representation
    pub const fn with_representation(representation: MachineRepresentation) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            header_size: 2 * POINTER_SIZE,
            representation,
        }
    }
}

/// The kind of an elements-kind transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementsTransition {
    /// In-place map change; the backing store is reused
    FastTransition,
    /// The backing store is reallocated
    SlowTransition,
}

/// An opaque reference to a heap object known at compile time
///
/// Well-known objects the backend needs to recognize get named constants;
/// everything else is just an interned handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(pub u32);

impl HeapRef {
    /// The map of plain (tagged) element backing stores
    pub const FIXED_ARRAY_MAP: Self = Self(0);
    /// The map of unboxed-double element backing stores
    pub const FIXED_DOUBLE_ARRAY_MAP: Self = Self(1);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

/// Fieldless mirror of [`Operator`] used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Start,
    Parameter,
    HeapConstant,
    Int32Constant,
    Allocate,
    FinishRegion,
    CheckMaps,
    EnsureWritableFastElements,
    MaybeGrowFastElements,
    TransitionElementsKind,
    LoadField,
    StoreField,
    LoadElement,
    StoreElement,
    StoreTypedElement,
    StoreBuffer,
    Call,
    EffectPhi,
    Merge,
    Loop,
    Return,
    Dead,
}

/// An operation together with its static parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Root of both the effect and control chains
    Start,
    /// The i-th incoming function parameter
    Parameter(u32),
    /// A reference to a compile-time-known heap object
    HeapConstant(HeapRef),
    Int32Constant(i32),
    /// Fresh heap memory; the single value input is the size
    Allocate,
    /// Finalizes an allocation region; forwards its first input
    FinishRegion,
    /// Deoptimizes unless the object's map is one of the listed maps,
    /// which follow the object as value inputs
    CheckMaps { map_count: u32 },
    /// Returns a writable (non-copy-on-write) backing store for the object
    EnsureWritableFastElements,
    /// Returns a backing store for the object large enough for the index
    MaybeGrowFastElements(GrowFastElementsFlags),
    /// Changes the object's map from the source map to the target map
    TransitionElementsKind(ElementsTransition),
    LoadField(FieldAccess),
    StoreField(FieldAccess),
    LoadElement(ElementAccess),
    StoreElement(ElementAccess),
    /// Store into a typed array's backing buffer
    StoreTypedElement,
    /// Raw store into an untyped buffer
    StoreBuffer,
    /// A call with arbitrary side effects
    Call { arg_count: u32 },
    /// Merges the effect chains of the control predecessors
    EffectPhi { input_count: u32 },
    /// Control join of several forward predecessors
    Merge { input_count: u32 },
    /// Control join of one entry predecessor and one or more back edges
    Loop { input_count: u32 },
    Return,
    Dead,
}

impl Operator {
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Start => Opcode::Start,
            Self::Parameter(_) => Opcode::Parameter,
            Self::HeapConstant(_) => Opcode::HeapConstant,
            Self::Int32Constant(_) => Opcode::Int32Constant,
            Self::Allocate => Opcode::Allocate,
            Self::FinishRegion => Opcode::FinishRegion,
            Self::CheckMaps { .. } => Opcode::CheckMaps,
            Self::EnsureWritableFastElements => Opcode::EnsureWritableFastElements,
            Self::MaybeGrowFastElements(_) => Opcode::MaybeGrowFastElements,
            Self::TransitionElementsKind(_) => Opcode::TransitionElementsKind,
            Self::LoadField(_) => Opcode::LoadField,
            Self::StoreField(_) => Opcode::StoreField,
            Self::LoadElement(_) => Opcode::LoadElement,
            Self::StoreElement(_) => Opcode::StoreElement,
            Self::StoreTypedElement => Opcode::StoreTypedElement,
            Self::StoreBuffer => Opcode::StoreBuffer,
            Self::Call { .. } => Opcode::Call,
            Self::EffectPhi { .. } => Opcode::EffectPhi,
            Self::Merge { .. } => Opcode::Merge,
            Self::Loop { .. } => Opcode::Loop,
            Self::Return => Opcode::Return,
            Self::Dead => Opcode::Dead,
        }
    }

    /// Number of value inputs the operator expects
    pub const fn value_input_count(&self) -> usize {
        match self {
            Self::Start
            | Self::Parameter(_)
            | Self::HeapConstant(_)
            | Self::Int32Constant(_)
            | Self::EffectPhi { .. }
            | Self::Merge { .. }
            | Self::Loop { .. }
            | Self::Dead => 0,
            Self::Allocate | Self::FinishRegion | Self::LoadField(_) | Self::Return => 1,
            Self::EnsureWritableFastElements | Self::StoreField(_) | Self::LoadElement(_) => 2,
            Self::TransitionElementsKind(_) | Self::StoreElement(_) | Self::StoreBuffer => 3,
            Self::MaybeGrowFastElements(_) => 4,
            Self::StoreTypedElement => 5,
            Self::CheckMaps { map_count } => 1 + *map_count as usize,
            Self::Call { arg_count } => *arg_count as usize,
        }
    }

    /// Number of effect inputs the operator expects
    pub const fn effect_input_count(&self) -> usize {
        match self {
            Self::Start
            | Self::Parameter(_)
            | Self::HeapConstant(_)
            | Self::Int32Constant(_)
            | Self::Merge { .. }
            | Self::Loop { .. }
            | Self::Dead => 0,
            Self::EffectPhi { input_count } => *input_count as usize,
            _ => 1,
        }
    }

    /// Number of effect outputs the operator produces
    pub const fn effect_output_count(&self) -> usize {
        match self {
            Self::Parameter(_)
            | Self::HeapConstant(_)
            | Self::Int32Constant(_)
            | Self::Merge { .. }
            | Self::Loop { .. }
            | Self::Return
            | Self::Dead => 0,
            _ => 1,
        }
    }

    /// Number of control inputs the operator expects
    pub const fn control_input_count(&self) -> usize {
        match self {
            Self::EffectPhi { .. } => 1,
            Self::Merge { input_count } | Self::Loop { input_count } => *input_count as usize,
            _ => 0,
        }
    }

    pub const fn properties(&self) -> OperatorProperties {
        match self {
            Self::Start
            | Self::Parameter(_)
            | Self::HeapConstant(_)
            | Self::Int32Constant(_)
            | Self::Allocate
            | Self::FinishRegion
            | Self::CheckMaps { .. }
            | Self::LoadField(_)
            | Self::LoadElement(_)
            | Self::EffectPhi { .. }
            | Self::Merge { .. }
            | Self::Loop { .. }
            | Self::Return
            | Self::Dead => OperatorProperties::NO_WRITE,
            Self::StoreField(_)
            | Self::StoreElement(_)
            | Self::StoreTypedElement
            | Self::StoreBuffer
            | Self::EnsureWritableFastElements
            | Self::MaybeGrowFastElements(_)
            | Self::TransitionElementsKind(_)
            | Self::Call { .. } => OperatorProperties::empty(),
        }
    }

    pub fn has_property(&self, property: OperatorProperties) -> bool {
        self.properties().contains(property)
    }

    /// The field access of a `LoadField`/`StoreField` operator
    pub fn field_access(&self) -> &FieldAccess {
        match self {
            Self::LoadField(access) | Self::StoreField(access) => access,
            _ => unreachable!("operator {self:?} carries no field access"),
        }
    }

    /// The element access of a `LoadElement`/`StoreElement` operator
    pub fn element_access(&self) -> &ElementAccess {
        match self {
            Self::LoadElement(access) | Self::StoreElement(access) => access,
            _ => unreachable!("operator {self:?} carries no element access"),
        }
    }

    /// The flags of a `MaybeGrowFastElements` operator
    pub fn grow_fast_elements_flags(&self) -> GrowFastElementsFlags {
        match self {
            Self::MaybeGrowFastElements(flags) => *flags,
            _ => unreachable!("operator {self:?} carries no grow-elements flags"),
        }
    }

    /// The transition kind of a `TransitionElementsKind` operator
    pub fn elements_transition(&self) -> ElementsTransition {
        match self {
            Self::TransitionElementsKind(transition) => *transition,
            _ => unreachable!("operator {self:?} carries no elements transition"),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parameter(index) => write!(f, "Parameter[{index}]"),
            Self::HeapConstant(heap_ref) => write!(f, "HeapConstant[#{}]", heap_ref.0),
            Self::Int32Constant(value) => write!(f, "Int32Constant[{value}]"),
            Self::CheckMaps { map_count } => write!(f, "CheckMaps[{map_count}]"),
            Self::MaybeGrowFastElements(flags) => {
                write!(f, "MaybeGrowFastElements[{:#x}]", flags.bits())
            }
            Self::TransitionElementsKind(ElementsTransition::FastTransition) => {
                write!(f, "TransitionElementsKind[fast]")
            }
            Self::TransitionElementsKind(ElementsTransition::SlowTransition) => {
                write!(f, "TransitionElementsKind[slow]")
            }
            Self::LoadField(access) => write!(f, "LoadField[+{}]", access.offset),
            Self::StoreField(access) => write!(f, "StoreField[+{}]", access.offset),
            Self::Call { arg_count } => write!(f, "Call[{arg_count}]"),
            Self::EffectPhi { input_count } => write!(f, "EffectPhi[{input_count}]"),
            Self::Merge { input_count } => write!(f, "Merge[{input_count}]"),
            Self::Loop { input_count } => write!(f, "Loop[{input_count}]"),
            other => write!(f, "{:?}", other.opcode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arities_follow_parameters() {
        assert_eq!(3, Operator::CheckMaps { map_count: 2 }.value_input_count());
        assert_eq!(
            4,
            Operator::EffectPhi { input_count: 4 }.effect_input_count()
        );
        assert_eq!(2, Operator::Loop { input_count: 2 }.control_input_count());
    }

    #[test]
    fn write_properties() {
        assert!(Operator::Allocate.has_property(OperatorProperties::NO_WRITE));
        assert!(Operator::LoadField(FieldAccess::tagged(8)).has_property(
            OperatorProperties::NO_WRITE
        ));
        assert!(!Operator::StoreField(FieldAccess::tagged(8))
            .has_property(OperatorProperties::NO_WRITE));
        assert!(!Operator::Call { arg_count: 0 }.has_property(OperatorProperties::NO_WRITE));
    }

    #[test]
    fn display_includes_parameters() {
        assert_eq!(
            "LoadField[+16]",
            Operator::LoadField(FieldAccess::tagged(16)).to_string()
        );
        assert_eq!("Parameter[2]", Operator::Parameter(2).to_string());
    }
}
