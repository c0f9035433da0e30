//! The `World` facade.
//!
//! A [`World`] composes the entity registry, the per-type component pools,
//! and the system dispatcher behind one value type. It is an ordinary
//! value owned by the caller; there is no global instance. Two worlds in
//! the same process share only the component-id space.
//!
//! ## Concurrency model
//!
//! Registry-mutating operations (`create_entity`, `destroy_entity`,
//! `add_component`, `remove_component`, `flush`) serialize on a single
//! internal mutex. Reads (`has_*`, `get_component*`, mask queries,
//! iteration) do not lock: their safety comes from the dispatcher's
//! write-conflict rule, which guarantees that no two concurrently running
//! systems hold conflicting access to the same component type.
//!
//! One footgun is deliberately not defended against: a system that adds or
//! removes components of a type **not** listed in its access set, while
//! another concurrent system accesses that type, races the structural
//! change against the access. That combination is undefined behaviour;
//! consumers must list every touched type or serialize such systems
//! themselves.

use std::any::type_name;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use log::trace;
use rayon::prelude::*;

use crate::engine::access::AccessList;
use crate::engine::component::{component_id_of, Component, ComponentSet};
use crate::engine::dispatcher::SystemDispatcher;
use crate::engine::entity::EntityRegistry;
use crate::engine::pool::{ComponentPool, ErasedPool};
use crate::engine::system::{Execution, Iteration, System};
use crate::engine::types::{ComponentMask, EntityId, MAX_COMPONENTS};

struct WorldInner {
    /// Serializes registry and pool structure mutations.
    structural: Mutex<()>,
    entities: UnsafeCell<EntityRegistry>,
    pools: [UnsafeCell<Option<Box<dyn ErasedPool>>>; MAX_COMPONENTS],
    dispatcher: SystemDispatcher,
}

// The `UnsafeCell` fields are mutated only under `structural`; concurrent
// slot access is licensed by the dispatcher's conflict rule.
unsafe impl Sync for WorldInner {}

/// The ECS runtime: entity registry, component pools, system dispatcher.
///
/// Dropping the world joins residual background workers and destroys all
/// components.
pub struct World {
    inner: Arc<WorldInner>,
    /// Only the caller-owned value joins workers on drop; the views held
    /// by worker threads do not.
    primary: bool,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WorldInner {
                structural: Mutex::new(()),
                entities: UnsafeCell::new(EntityRegistry::new()),
                pools: std::array::from_fn(|_| UnsafeCell::new(None)),
                dispatcher: SystemDispatcher::new(),
            }),
            primary: true,
        }
    }

    fn lock_structural(&self) -> MutexGuard<'_, ()> {
        self.inner.structural.lock().expect("structural mutex poisoned")
    }

    #[inline]
    fn entities(&self) -> &EntityRegistry {
        unsafe { &*self.inner.entities.get() }
    }

    /// ## Safety
    /// The caller must hold the structural lock.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn entities_mut(&self) -> &mut EntityRegistry {
        unsafe { &mut *self.inner.entities.get() }
    }

    /// The pool for `T`. Panics if no entity ever carried a `T`.
    fn pool<T: Component>(&self) -> &ComponentPool<T> {
        let component_id = component_id_of::<T>();
        let slot = unsafe { &*self.inner.pools[component_id as usize].get() };
        let pool = slot
            .as_ref()
            .unwrap_or_else(|| panic!("no {} pool exists", type_name::<T>()));
        pool.as_any()
            .downcast_ref::<ComponentPool<T>>()
            .expect("component id maps to exactly one type")
    }

    /// ## Safety
    /// The caller must hold the structural lock.
    unsafe fn pool_or_create<T: Component>(&self) -> &ComponentPool<T> {
        let component_id = component_id_of::<T>();
        let slot = unsafe { &mut *self.inner.pools[component_id as usize].get() };
        let pool = slot.get_or_insert_with(|| Box::new(ComponentPool::<T>::new()));
        pool.as_any()
            .downcast_ref::<ComponentPool<T>>()
            .expect("component id maps to exactly one type")
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.inner).cast()
    }

    /// Allocates a new entity and returns its handle.
    ///
    /// The entity starts **invalid**: iteration and system dispatch skip
    /// it until [`flush`](Self::flush) or the next tick boundary exposes
    /// it. Components can be attached immediately.
    pub fn create_entity(&self) -> EntityHandle<'_> {
        let _guard = self.lock_structural();
        let id = unsafe { self.entities_mut() }.create();
        trace!("created entity {id}");
        EntityHandle { world: self, id }
    }

    /// Returns a handle for an existing entity id.
    ///
    /// ## Panics
    /// Panics if no entity with this id was ever created.
    pub fn entity_handle(&self, entity: EntityId) -> EntityHandle<'_> {
        assert!(
            (entity as usize) < self.entity_count(),
            "entity {entity} has never existed",
        );
        EntityHandle { world: self, id: entity }
    }

    /// Destroys an entity: removes every component its mask reports,
    /// zeroes the mask, and recycles the id.
    ///
    /// The entity is immediately invisible to every non-empty match. A
    /// stale handle to the id keeps working but reports
    /// [`is_alive`](EntityHandle::is_alive) `== false` until the id is
    /// reused.
    ///
    /// Destruction does not wait for in-flight systems; call this only
    /// from contexts already serialized against users of this entity's
    /// components (for example a system whose write mask conflicts with
    /// them).
    pub fn destroy_entity(&self, entity: EntityId) {
        let _guard = self.lock_structural();
        let mask = unsafe { self.entities_mut() }.mask(entity);
        for component_id in mask.iter_ids() {
            let slot = unsafe { &*self.inner.pools[component_id as usize].get() };
            if let Some(pool) = slot.as_ref() {
                unsafe { pool.remove(entity) };
            }
        }
        unsafe { self.entities_mut() }.destroy(entity);
        trace!("destroyed entity {entity}");
    }

    /// Attaches `component` to the entity and returns a view of the
    /// stored value.
    ///
    /// ## Panics
    /// Panics if the entity already carries a `T`.
    ///
    /// The returned reference is exclusive by the caller's discipline:
    /// it must not outlive a later conflicting access to the same slot.
    #[allow(clippy::mut_from_ref)]
    pub fn add_component<T: Component>(&self, entity: EntityId, component: T) -> &mut T {
        let component_id = component_id_of::<T>();
        let _guard = self.lock_structural();
        let registry = unsafe { self.entities_mut() };
        assert!(
            !registry.mask(entity).has(component_id),
            "entity {entity} already has a {} component",
            type_name::<T>(),
        );
        registry.mask_mut(entity).set(component_id);
        let pool = unsafe { self.pool_or_create::<T>() };
        let component = unsafe { pool.add(entity, component) };
        trace!("added {} to entity {entity}", type_name::<T>());
        unsafe { &mut *component }
    }

    /// Returns `true` if the entity's mask is a superset of `mask`.
    #[inline]
    pub fn has_mask(&self, entity: EntityId, mask: ComponentMask) -> bool {
        self.entities().has_all(entity, mask)
    }

    /// Returns `true` if the entity carries every component in `S`.
    #[inline]
    pub fn has_components<S: ComponentSet>(&self, entity: EntityId) -> bool {
        self.has_mask(entity, S::mask())
    }

    /// A shared view of the entity's `T` component.
    ///
    /// ## Panics
    /// Panics if the entity has no `T`.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> &T {
        assert!(
            self.has_mask(entity, ComponentMask::single(component_id_of::<T>())),
            "entity {entity} has no {} component",
            type_name::<T>(),
        );
        unsafe { self.fetch_component::<T>(entity) }
    }

    /// A mutable view of the entity's `T` component.
    ///
    /// ## Panics
    /// Panics if the entity has no `T`.
    ///
    /// The reference is exclusive by the caller's discipline: within
    /// systems, the dispatcher's conflict rule provides it; outside them,
    /// the caller must not hold another reference to the same slot.
    #[allow(clippy::mut_from_ref)]
    pub fn get_component_mut<T: Component>(&self, entity: EntityId) -> &mut T {
        assert!(
            self.has_mask(entity, ComponentMask::single(component_id_of::<T>())),
            "entity {entity} has no {} component",
            type_name::<T>(),
        );
        unsafe { self.fetch_component_mut::<T>(entity) }
    }

    /// Detaches the entity's `T` component, dropping it in place.
    ///
    /// ## Panics
    /// Panics if the entity has no `T`.
    pub fn remove_component<T: Component>(&self, entity: EntityId) {
        let component_id = component_id_of::<T>();
        let _guard = self.lock_structural();
        let registry = unsafe { self.entities_mut() };
        assert!(
            registry.mask(entity).has(component_id),
            "entity {entity} has no {} component to remove",
            type_name::<T>(),
        );
        registry.mask_mut(entity).clear(component_id);
        unsafe { self.pool::<T>().remove(entity) };
        trace!("removed {} from entity {entity}", type_name::<T>());
    }

    /// The entity's component mask.
    #[inline]
    pub fn component_mask(&self, entity: EntityId) -> ComponentMask {
        self.entities().mask(entity)
    }

    /// Whether the entity has been exposed to iteration.
    #[inline]
    pub fn is_valid(&self, entity: EntityId) -> bool {
        self.entities().is_valid(entity)
    }

    /// Number of entity slots ever allocated in this world.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities().count()
    }

    /// Marks one entity valid, exposing it to iteration before the tick
    /// boundary.
    pub fn flush(&self, entity: EntityId) {
        let _guard = self.lock_structural();
        unsafe { self.entities_mut() }.flush(entity);
    }

    /// Marks every entity valid. Idempotent.
    pub fn flush_all(&self) {
        let _guard = self.lock_structural();
        unsafe { self.entities_mut() }.flush_all();
    }

    /// Joins every running background system, in arbitrary order.
    pub fn join_system_threads(&self) {
        self.inner.dispatcher.join_all();
    }

    /// The tick boundary: joins every running worker, then marks every
    /// entity valid. Between ticks no workers are running and every write
    /// issued during the tick is visible.
    pub fn finish_tick(&self) {
        self.join_system_threads();
        self.flush_all();
    }

    /// A lazy forward iterator over the handles of every valid entity
    /// carrying all components in `S`, in ascending id order.
    ///
    /// `S = ()` matches every valid entity.
    pub fn entities_with<S: ComponentSet>(&self) -> EntitiesWith<'_> {
        EntitiesWith {
            world: self,
            mask: S::mask(),
            next: 0,
        }
    }

    /// Dispatches a system over every valid entity matching the access
    /// list `A`.
    ///
    /// Before anything runs, every currently running background system
    /// whose write mask overlaps `A`'s access is joined: writes conflict
    /// with reads and writes, reads never conflict with reads.
    ///
    /// With [`Execution::Background`] the iteration is packaged as a
    /// worker thread and this call returns immediately; the worker is
    /// joined at the next conflicting dispatch or at
    /// [`finish_tick`](Self::finish_tick). With [`Iteration::Parallel`]
    /// matching entities are partitioned across the rayon pool.
    ///
    /// Entities created during the dispatch stay invisible until flushed.
    ///
    /// Adding or removing components of a type **not** in `A`, while
    /// another concurrent system accesses that type, is undefined
    /// behaviour (see the module documentation).
    pub fn tick_system<A, Marker, F>(&self, execution: Execution, iteration: Iteration, system: F)
    where
        A: AccessList,
        Marker: 'static,
        F: System<A, Marker>,
    {
        let read_mask = A::read_mask();
        let write_mask = A::write_mask();
        self.inner.dispatcher.wait_for_conflicts(read_mask, write_mask);

        match execution {
            Execution::Inline => self.run_system::<A, Marker, F>(iteration, &system),
            Execution::Background => {
                let inner = Arc::clone(&self.inner);
                let worker = thread::Builder::new()
                    .name(String::from("tickworld-system"))
                    .spawn(move || {
                        let world = World {
                            inner,
                            primary: false,
                        };
                        world.run_system::<A, Marker, F>(iteration, &system);
                    })
                    .expect("failed to spawn system worker thread");
                self.inner.dispatcher.register(read_mask, write_mask, worker);
            }
        }
    }

    fn run_system<A, Marker, F>(&self, iteration: Iteration, system: &F)
    where
        A: AccessList,
        Marker: 'static,
        F: System<A, Marker>,
    {
        let mask = A::full_mask();
        match iteration {
            Iteration::Sequential => {
                let mut entity: EntityId = 0;
                while (entity as usize) < self.entity_count() {
                    if self.is_valid(entity) && self.has_mask(entity, mask) {
                        let item = unsafe { A::fetch(self, entity) };
                        system.run(EntityHandle { world: self, id: entity }, item);
                    }
                    entity += 1;
                }
            }
            Iteration::Parallel => {
                let count = self.entity_count() as EntityId;
                (0..count).into_par_iter().for_each(|entity| {
                    if self.is_valid(entity) && self.has_mask(entity, mask) {
                        let item = unsafe { A::fetch(self, entity) };
                        system.run(EntityHandle { world: self, id: entity }, item);
                    }
                });
            }
        }
    }

    /// ## Safety
    /// The slot must be occupied and the dispatch discipline must hold.
    pub(crate) unsafe fn fetch_component<'w, T: Component>(&'w self, entity: EntityId) -> &'w T {
        unsafe { &*self.pool::<T>().get_ptr(entity) }
    }

    /// ## Safety
    /// The slot must be occupied, the dispatch discipline must hold, and
    /// no other reference to this slot may be alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn fetch_component_mut<'w, T: Component>(
        &'w self,
        entity: EntityId,
    ) -> &'w mut T {
        unsafe { &mut *self.pool::<T>().get_ptr(entity) }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if self.primary {
            self.inner.dispatcher.join_all();
        }
    }
}

/// Value-type reference to an entity: a world reference plus an id.
///
/// Handles are freely copyable; entities have no per-instance storage
/// beyond their registry slot. A handle whose entity has been destroyed
/// keeps its id but reports [`is_alive`](Self::is_alive) `== false`, which
/// lets code holding stale handles tolerate batched destructions.
#[derive(Clone, Copy)]
pub struct EntityHandle<'w> {
    world: &'w World,
    id: EntityId,
}

impl<'w> EntityHandle<'w> {
    /// The entity id this handle refers to.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The world this handle belongs to.
    #[inline]
    pub fn world(&self) -> &'w World {
        self.world
    }

    /// Attaches `component` to the entity. See
    /// [`World::add_component`].
    pub fn add<T: Component>(&self, component: T) -> &'w mut T {
        self.world.add_component(self.id, component)
    }

    /// Returns `true` if the entity carries every component in `S`.
    pub fn has<S: ComponentSet>(&self) -> bool {
        self.world.has_components::<S>(self.id)
    }

    /// A shared view of the entity's `T`. See [`World::get_component`].
    pub fn get<T: Component>(&self) -> &'w T {
        self.world.get_component(self.id)
    }

    /// A mutable view of the entity's `T`. See
    /// [`World::get_component_mut`].
    pub fn get_mut<T: Component>(&self) -> &'w mut T {
        self.world.get_component_mut(self.id)
    }

    /// A mutable view of the entity's `T`, default-constructing it first
    /// if absent.
    pub fn get_or_default<T: Component + Default>(&self) -> &'w mut T {
        if !self.has::<(T,)>() {
            self.world.add_component(self.id, T::default());
        }
        self.world.get_component_mut(self.id)
    }

    /// Detaches the entity's `T`. See [`World::remove_component`].
    pub fn remove<T: Component>(&self) {
        self.world.remove_component::<T>(self.id)
    }

    /// Destroys the entity, consuming the handle. Copies of the handle
    /// keep the stale id and report [`is_alive`](Self::is_alive)
    /// `== false`.
    pub fn destroy(self) {
        self.world.destroy_entity(self.id);
    }

    /// Returns `true` while the entity carries at least one component:
    /// the "does this id still refer to something" check for stale
    /// handles.
    pub fn is_alive(&self) -> bool {
        !self.world.component_mask(self.id).is_empty()
    }
}

impl PartialEq for EntityHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.world.identity() == other.world.identity() && self.id == other.id
    }
}

impl Eq for EntityHandle<'_> {}

impl fmt::Debug for EntityHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle").field("id", &self.id).finish()
    }
}

/// Lazy forward iterator over matching entity handles.
///
/// Produced by [`World::entities_with`]. Visits every valid entity whose
/// mask is a superset of the query mask, in ascending id order,
/// re-checking liveness as it goes so destructions during iteration are
/// observed.
pub struct EntitiesWith<'w> {
    world: &'w World,
    mask: ComponentMask,
    next: EntityId,
}

impl<'w> Iterator for EntitiesWith<'w> {
    type Item = EntityHandle<'w>;

    fn next(&mut self) -> Option<EntityHandle<'w>> {
        while (self.next as usize) < self.world.entity_count() {
            let id = self.next;
            self.next += 1;
            if self.world.is_valid(id) && self.world.has_mask(id, self.mask) {
                return Some(EntityHandle {
                    world: self.world,
                    id,
                });
            }
        }
        None
    }
}
