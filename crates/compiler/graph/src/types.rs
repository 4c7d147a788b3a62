//! # Type Lattice
//!
//! A coarse bitset lattice over the value classes of the source language.
//! Passes only ever ask two questions of it: can two types overlap
//! ([`Type::maybe`]), and is one type a subtype of another ([`Type::is`]).

bitflags::bitflags! {
    /// A set of value classes; the empty set is the bottom of the lattice and
    /// [`Type::ANY`] is the top.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Type: u32 {
        /// Small integers that fit in a tagged immediate
        const SIGNED_SMALL = 1 << 0;
        /// All other numbers (heap numbers)
        const OTHER_NUMBER = 1 << 1;
        const BOOLEAN = 1 << 2;
        const STRING = 1 << 3;
        /// Language-level arrays
        const ARRAY = 1 << 4;
        /// Other language-level objects
        const OTHER_OBJECT = 1 << 5;
        /// Non-language heap objects: maps, element backing stores, code
        const INTERNAL = 1 << 6;

        const NUMBER = Self::SIGNED_SMALL.bits() | Self::OTHER_NUMBER.bits();
        const RECEIVER = Self::ARRAY.bits() | Self::OTHER_OBJECT.bits();
        const ANY = Self::NUMBER.bits()
            | Self::BOOLEAN.bits()
            | Self::STRING.bits()
            | Self::RECEIVER.bits()
            | Self::INTERNAL.bits();
    }
}

impl Type {
    /// The empty type; no value inhabits it
    pub const NONE: Self = Self::empty();

    /// Returns true if a value could inhabit both `self` and `other`
    pub fn maybe(self, other: Self) -> bool {
        self.intersects(other)
    }

    /// Returns true if `self` is a subtype of `other`
    pub fn is(self, other: Self) -> bool {
        other.contains(self)
    }
}
