//! # Component Registry
//!
//! This module provides a global registry that assigns stable
//! [`ComponentId`] values to Rust component types, and the [`ComponentSet`]
//! abstraction that folds a tuple of component types into a match mask.
//!
//! ## Purpose
//! The registry decouples component type identity (`TypeId`) from runtime
//! storage: pools, entity masks, and scheduler masks all speak in compact
//! ids so that a full component set fits one mask word.
//!
//! ## Design
//! - Components are registered implicitly the first time they are touched
//!   and assigned a compact id in `[0, MAX_COMPONENTS)`.
//! - Ids are **process-global**, not per-world, so a mask bit has a single
//!   meaning everywhere. Two worlds in the same process share the id space
//!   (and therefore the type ceiling).
//! - A component type and its read-only view are the same component type:
//!   access markers resolve through the bare type, so mixed-mutability
//!   access lists map onto the same bits.
//!
//! ## Invariants
//! - Ids are unique and stable for the lifetime of the process.
//! - Exceeding [`MAX_COMPONENTS`] distinct types is a programmer error and
//!   aborts via panic; there is no recovery path.
//!
//! ## Concurrency
//! The registry is protected by `RwLock` for concurrent reads and
//! serialized first-use registration.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

use crate::engine::types::{ComponentId, ComponentMask, MAX_COMPONENTS};

/// A plain data type attachable to entities.
///
/// Components should be data without behavior; systems provide the
/// behavior. Keep components small and focused for cache density.
///
/// ## Storage tuning
/// `BLOCK_SIZE` is the number of slots per storage page in this
/// component's pool. Small values minimize memory for sparse components,
/// large values maximize cache density for common ones. This is the only
/// per-component configuration.
pub trait Component: Send + Sync + 'static {
    /// Slots per storage block in this component's pool.
    const BLOCK_SIZE: usize = 64;
}

struct ComponentIds {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
}

static COMPONENT_IDS: OnceLock<RwLock<ComponentIds>> = OnceLock::new();

fn component_ids() -> &'static RwLock<ComponentIds> {
    COMPONENT_IDS.get_or_init(|| {
        RwLock::new(ComponentIds {
            next_id: 0,
            by_type: HashMap::new(),
        })
    })
}

/// Returns the process-wide [`ComponentId`] for `T`, registering it on
/// first use.
///
/// ## Panics
/// Panics when a new registration would exceed [`MAX_COMPONENTS`] distinct
/// component types. This is a programmer error: the runtime assumes the
/// whole component vocabulary of a process fits one mask word.
pub fn component_id_of<T: Component>() -> ComponentId {
    let type_id = TypeId::of::<T>();
    let ids = component_ids();

    if let Some(&id) = ids
        .read()
        .expect("component id registry poisoned")
        .by_type
        .get(&type_id)
    {
        return id;
    }

    let mut ids = ids.write().expect("component id registry poisoned");
    // A racing registration may have won between the two locks.
    if let Some(&id) = ids.by_type.get(&type_id) {
        return id;
    }

    let id = ids.next_id;
    assert!(
        (id as usize) < MAX_COMPONENTS,
        "component type limit exceeded: registering {} would be type #{} of at most {}",
        type_name::<T>(),
        id as usize + 1,
        MAX_COMPONENTS,
    );
    ids.next_id += 1;
    ids.by_type.insert(type_id, id);
    id
}

/// A tuple of component types usable as a match requirement.
///
/// The unit tuple `()` yields the empty mask and therefore matches every
/// valid entity.
pub trait ComponentSet: 'static {
    /// The mask with one bit set per member component type.
    fn mask() -> ComponentMask;
}

impl ComponentSet for () {
    fn mask() -> ComponentMask {
        ComponentMask::EMPTY
    }
}

macro_rules! impl_component_set {
    ($($component:ident),+) => {
        impl<$($component: Component),+> ComponentSet for ($($component,)+) {
            fn mask() -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $( mask.set(component_id_of::<$component>()); )+
                mask
            }
        }
    };
}

impl_component_set!(C0);
impl_component_set!(C0, C1);
impl_component_set!(C0, C1, C2);
impl_component_set!(C0, C1, C2, C3);
impl_component_set!(C0, C1, C2, C3, C4);
impl_component_set!(C0, C1, C2, C3, C4, C5);
impl_component_set!(C0, C1, C2, C3, C4, C5, C6);
impl_component_set!(C0, C1, C2, C3, C4, C5, C6, C7);
