//! Core Types, Identifiers, and Bit-Level Layouts
//!
//! This module defines the **fundamental types, identifiers, and bit
//! layouts** shared across all subsystems of the runtime: entity
//! allocation, component pools, matching, and system scheduling.
//!
//! ## Design Philosophy
//!
//! The runtime is designed around:
//!
//! - **Dense entity ids** indexing parallel metadata arrays,
//! - **Single-word component masks** for O(1) match and conflict checks,
//! - **Stable numeric identifiers** for component types,
//! - **No heap allocation in hot paths.**
//!
//! ## Component Masks
//!
//! At most [`MAX_COMPONENTS`] distinct component types exist per process,
//! chosen so that a per-entity [`ComponentMask`] fits in one 64-bit word.
//! Masks describe both what an entity carries and what a query or system
//! requires; all matching and scheduler conflict arithmetic reduces to
//! bitwise operations on single words.

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Dense integer identifying an entity within a [`World`](crate::World).
pub type EntityId = u32;

/// Sentinel id carried by handles whose entity has been destroyed.
pub const INVALID_ENTITY: EntityId = EntityId::MAX;

/// Stable small integer identifying a component type, in `[0, MAX_COMPONENTS)`.
pub type ComponentId = u32;

/// Maximum number of distinct component types per process.
///
/// Fixed at the width of a [`ComponentMask`] word so that scheduler
/// conflict checks stay single-word operations.
pub const MAX_COMPONENTS: usize = 64;

/// Bitset over [`ComponentId`]s, packed into one 64-bit word.
///
/// An entity's mask has bit `c` set exactly when the pool for component
/// `c` holds the entity's slot occupied. Queries and systems use masks of
/// the same shape to describe required component sets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The empty mask. Matches every valid entity.
    pub const EMPTY: Self = Self(0);

    /// The mask with every component bit set.
    pub const ALL: Self = Self(u64::MAX);

    /// Returns the mask containing only `component_id`.
    #[inline]
    pub fn single(component_id: ComponentId) -> Self {
        debug_assert!((component_id as usize) < MAX_COMPONENTS);
        Self(1u64 << component_id)
    }

    /// Sets the bit corresponding to `component_id`.
    #[inline]
    pub fn set(&mut self, component_id: ComponentId) {
        debug_assert!((component_id as usize) < MAX_COMPONENTS);
        self.0 |= 1u64 << component_id;
    }

    /// Clears the bit corresponding to `component_id`.
    #[inline]
    pub fn clear(&mut self, component_id: ComponentId) {
        debug_assert!((component_id as usize) < MAX_COMPONENTS);
        self.0 &= !(1u64 << component_id);
    }

    /// Returns `true` if `component_id` is present in this mask.
    #[inline]
    pub fn has(self, component_id: ComponentId) -> bool {
        (self.0 >> component_id) & 1 == 1
    }

    /// Returns `true` if every component in `other` is present in `self`.
    #[inline]
    pub fn contains_all(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns `true` if `self` and `other` share at least one component.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Returns `true` if no component bit is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw mask word.
    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Iterates over all component ids set in this mask, ascending.
    pub fn iter_ids(self) -> impl Iterator<Item = ComponentId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let tz = bits.trailing_zeros();
            bits &= bits - 1;
            Some(tz as ComponentId)
        })
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ComponentMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}
