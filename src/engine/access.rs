//! Component access declaration.
//!
//! Systems declare the components they touch as an explicit type list of
//! [`Read`] and [`Write`] markers, e.g. `(Write<Position>, Read<Velocity>)`.
//! From that list the dispatcher derives:
//!
//! - `read_mask` — bits for every component accessed read-only,
//! - `write_mask` — bits for every component accessed mutably,
//! - `full_mask = read_mask | write_mask` — the match requirement.
//!
//! A component and its read-only view are the **same** component type:
//! both markers resolve through the bare `T`, so a list mixing `Read<T>`
//! and `Write<T>` folds onto one mask bit.
//!
//! The list is an explicit type parameter (rather than being reflected
//! from the callable) so that the callable's extra captured state never
//! interferes with access derivation.

use std::marker::PhantomData;

use crate::engine::component::{component_id_of, Component};
use crate::engine::types::{ComponentMask, EntityId};
use crate::engine::world::World;

/// Declares read-only access to component `T` in a system's access list.
pub struct Read<T>(PhantomData<T>);

/// Declares mutable access to component `T` in a system's access list.
pub struct Write<T>(PhantomData<T>);

/// A single member of a system's access list.
pub trait Access: 'static {
    /// The component type behind this marker.
    type Target: Component;

    /// The reference handed to the system for one matching entity.
    type Fetched<'w>: Send;

    /// Whether this marker contributes to the write mask.
    const MUTABLE: bool;

    /// Produces the reference for `entity`'s component.
    ///
    /// ## Safety
    /// The entity's slot must be occupied, and the caller must guarantee
    /// the aliasing discipline of the dispatch: no conflicting reference
    /// to the same slot is alive.
    unsafe fn fetch<'w>(world: &'w World, entity: EntityId) -> Self::Fetched<'w>;
}

impl<T: Component> Access for Read<T> {
    type Target = T;
    type Fetched<'w> = &'w T;
    const MUTABLE: bool = false;

    unsafe fn fetch<'w>(world: &'w World, entity: EntityId) -> &'w T {
        unsafe { world.fetch_component::<T>(entity) }
    }
}

impl<T: Component> Access for Write<T> {
    type Target = T;
    type Fetched<'w> = &'w mut T;
    const MUTABLE: bool = true;

    unsafe fn fetch<'w>(world: &'w World, entity: EntityId) -> &'w mut T {
        unsafe { world.fetch_component_mut::<T>(entity) }
    }
}

/// A tuple of [`Access`] markers forming a system's component access set.
pub trait AccessList: 'static {
    /// The bundle of references handed to the system per matching entity.
    type Item<'w>: Send;

    /// Mask of components accessed read-only.
    fn read_mask() -> ComponentMask;

    /// Mask of components accessed mutably.
    fn write_mask() -> ComponentMask;

    /// The match requirement: union of read and write masks.
    fn full_mask() -> ComponentMask {
        Self::read_mask() | Self::write_mask()
    }

    /// Fetches the whole bundle for one entity.
    ///
    /// ## Safety
    /// Same contract as [`Access::fetch`] for every member.
    unsafe fn fetch<'w>(world: &'w World, entity: EntityId) -> Self::Item<'w>;
}

macro_rules! impl_access_list {
    ($($access:ident),+) => {
        impl<$($access: Access),+> AccessList for ($($access,)+) {
            type Item<'w> = ($($access::Fetched<'w>,)+);

            fn read_mask() -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $(
                    if !$access::MUTABLE {
                        mask.set(component_id_of::<$access::Target>());
                    }
                )+
                mask
            }

            fn write_mask() -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $(
                    if $access::MUTABLE {
                        mask.set(component_id_of::<$access::Target>());
                    }
                )+
                mask
            }

            unsafe fn fetch<'w>(world: &'w World, entity: EntityId) -> Self::Item<'w> {
                ($(unsafe { $access::fetch(world, entity) },)+)
            }
        }
    };
}

impl_access_list!(A0);
impl_access_list!(A0, A1);
impl_access_list!(A0, A1, A2);
impl_access_list!(A0, A1, A2, A3);
impl_access_list!(A0, A1, A2, A3, A4);
impl_access_list!(A0, A1, A2, A3, A4, A5);
impl_access_list!(A0, A1, A2, A3, A4, A5, A6);
impl_access_list!(A0, A1, A2, A3, A4, A5, A6, A7);
