//! Paged component storage.
//!
//! One [`ComponentPool`] stores every instance of a single component type,
//! indexed directly by entity id: the slot for entity `e` is always at
//! block `e / BLOCK_SIZE`, offset `e % BLOCK_SIZE`. There is no indirection
//! table, so entity-id to component-address is O(1) and neighbouring ids
//! stay cache-adjacent.
//!
//! Blocks allocate their backing storage lazily on first use and release
//! it when their last slot empties; the block record itself remains so
//! block indices stay stable.

use std::{
    any::{type_name, Any},
    cell::UnsafeCell,
    mem::MaybeUninit,
};

use crate::engine::component::Component;
use crate::engine::types::EntityId;

/// Word-packed occupancy bitset for one block.
struct OccupancyBits {
    words: Box<[u64]>,
}

impl OccupancyBits {
    fn new(bits: usize) -> Self {
        Self {
            words: vec![0u64; (bits + 63) / 64].into_boxed_slice(),
        }
    }

    #[inline]
    fn set(&mut self, index: usize) {
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    #[inline]
    fn clear(&mut self, index: usize) {
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    #[inline]
    fn test(&self, index: usize) -> bool {
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    #[inline]
    fn none(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }
}

/// One page of a pool.
///
/// Invariant:
/// - `data` is `Some` if and only if at least one occupancy bit is set.
/// - When `Some`, `data` holds exactly `BLOCK_SIZE` slots.
/// - A slot's contents are initialized if and only if its bit is set.
struct Block<T> {
    data: Option<Box<[UnsafeCell<MaybeUninit<T>>]>>,
    occupied: OccupancyBits,
}

impl<T: Component> Block<T> {
    fn empty() -> Self {
        Self {
            data: None,
            occupied: OccupancyBits::new(T::BLOCK_SIZE),
        }
    }
}

/// Storage for all instances of component `T`, at most one per entity id.
///
/// The pool is an ordered sequence of fixed-size blocks. Construction and
/// destruction happen in place inside block storage; occupancy is tracked
/// in a side bitset per block so the component values themselves stay
/// densely packed for iteration.
///
/// ## Concurrency
/// The pool uses interior mutability so that slot references can be handed
/// out while the pool is shared between system workers. Structural
/// operations ([`add`](Self::add), [`remove`](Self::remove)) require the
/// caller to serialize them externally; the world's structural mutex does
/// this. Concurrent access to *different* slots of the same pool is the
/// caller-asserted contract of parallel iteration.
pub struct ComponentPool<T: Component> {
    blocks: UnsafeCell<Vec<Block<T>>>,
}

// Slot access is coordinated by the dispatcher's conflict rule and the
// world's structural mutex; the cell itself carries no synchronization.
unsafe impl<T: Component> Sync for ComponentPool<T> {}

impl<T: Component> ComponentPool<T> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        assert!(T::BLOCK_SIZE > 0, "BLOCK_SIZE of {} must be non-zero", type_name::<T>());
        Self {
            blocks: UnsafeCell::new(Vec::new()),
        }
    }

    #[inline]
    fn locate(entity: EntityId) -> (usize, usize) {
        (
            entity as usize / T::BLOCK_SIZE,
            entity as usize % T::BLOCK_SIZE,
        )
    }

    /// Constructs `value` in place in entity `entity`'s slot and returns a
    /// pointer to it. Grows the block sequence as needed; allocates block
    /// storage on first use.
    ///
    /// ## Panics
    /// Panics if the slot is already occupied.
    ///
    /// ## Safety
    /// The caller must serialize this against every other structural
    /// operation on the same pool (the world's structural mutex), and no
    /// reference to this entity's slot may be alive.
    pub unsafe fn add(&self, entity: EntityId, value: T) -> *mut T {
        assert!(
            !self.has(entity),
            "entity {} already has a {} component",
            entity,
            type_name::<T>(),
        );
        let (block_index, slot_index) = Self::locate(entity);
        let blocks = unsafe { &mut *self.blocks.get() };
        if blocks.len() <= block_index {
            blocks.resize_with(block_index + 1, Block::empty);
        }
        let block = &mut blocks[block_index];
        let data = block.data.get_or_insert_with(|| {
            (0..T::BLOCK_SIZE)
                .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
                .collect()
        });
        block.occupied.set(slot_index);
        let slot = data[slot_index].get();
        let component = unsafe { (*slot).write(value) };
        component as *mut T
    }

    /// Returns `true` if entity `entity`'s slot is occupied.
    #[inline]
    pub fn has(&self, entity: EntityId) -> bool {
        let (block_index, slot_index) = Self::locate(entity);
        let blocks = unsafe { &*self.blocks.get() };
        blocks
            .get(block_index)
            .map_or(false, |block| block.occupied.test(slot_index))
    }

    /// Returns a view of entity `entity`'s component.
    ///
    /// ## Panics
    /// Panics if the slot is not occupied.
    #[inline]
    pub fn get(&self, entity: EntityId) -> &T {
        unsafe { &*self.get_ptr(entity) }
    }

    /// Returns a raw pointer to entity `entity`'s in-place component.
    ///
    /// ## Panics
    /// Panics if the slot is not occupied.
    pub(crate) fn get_ptr(&self, entity: EntityId) -> *mut T {
        assert!(
            self.has(entity),
            "entity {} has no {} component",
            entity,
            type_name::<T>(),
        );
        let (block_index, slot_index) = Self::locate(entity);
        let blocks = unsafe { &*self.blocks.get() };
        let data = blocks[block_index]
            .data
            .as_ref()
            .expect("occupied block has storage");
        data[slot_index].get().cast::<T>()
    }

    /// Drops entity `entity`'s component in place and clears its occupancy
    /// bit. Releases the block's storage when the block empties.
    ///
    /// ## Panics
    /// Panics if the slot is not occupied.
    ///
    /// ## Safety
    /// Same contract as [`add`](Self::add): externally serialized, and no
    /// reference to this entity's slot may be alive.
    pub unsafe fn remove(&self, entity: EntityId) {
        assert!(
            self.has(entity),
            "removing missing {} component from entity {}",
            type_name::<T>(),
            entity,
        );
        let (block_index, slot_index) = Self::locate(entity);
        let blocks = unsafe { &mut *self.blocks.get() };
        let block = &mut blocks[block_index];
        {
            let data = block.data.as_mut().expect("occupied block has storage");
            unsafe { data[slot_index].get_mut().assume_init_drop() };
            block.occupied.clear(slot_index);
        }
        if block.occupied.none() {
            block.data = None;
        }
    }

    /// Number of block records (allocated or not) in this pool.
    pub fn block_count(&self) -> usize {
        unsafe { &*self.blocks.get() }.len()
    }

    /// Returns `true` if block `index` currently has backing storage.
    ///
    /// ## Panics
    /// Panics if `index` is out of range.
    pub fn block_is_allocated(&self, index: usize) -> bool {
        let blocks = unsafe { &*self.blocks.get() };
        blocks[index].data.is_some()
    }
}

impl<T: Component> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Drop for ComponentPool<T> {
    fn drop(&mut self) {
        for block in self.blocks.get_mut() {
            if let Some(data) = block.data.as_mut() {
                for (slot_index, slot) in data.iter_mut().enumerate() {
                    if block.occupied.test(slot_index) {
                        unsafe { slot.get_mut().assume_init_drop() };
                    }
                }
            }
        }
    }
}

/// Type-erased pool surface.
///
/// Exactly the operations the world needs to address pools uniformly by
/// component id: removal during entity destruction, and the downcast back
/// to the typed pool. The id-to-type mapping of the component registry
/// guarantees the downcast.
pub(crate) trait ErasedPool: Send + Sync {
    /// ## Safety
    /// Same contract as [`ComponentPool::remove`].
    unsafe fn remove(&self, entity: EntityId);

    fn as_any(&self) -> &dyn Any;
}

impl<T: Component> ErasedPool for ComponentPool<T> {
    unsafe fn remove(&self, entity: EntityId) {
        unsafe { ComponentPool::remove(self, entity) };
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Quad(u32);
    impl Component for Quad {
        const BLOCK_SIZE: usize = 4;
    }

    struct Single(u8);
    impl Component for Single {
        const BLOCK_SIZE: usize = 1;
    }

    struct Wide(u64);
    impl Component for Wide {
        const BLOCK_SIZE: usize = 4096;
    }

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct DropProbe;
    impl Component for DropProbe {}
    impl Drop for DropProbe {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn occupancy_matches_storage<T: Component>(pool: &ComponentPool<T>) {
        for index in 0..pool.block_count() {
            let blocks = unsafe { &*pool.blocks.get() };
            assert_eq!(
                blocks[index].data.is_some(),
                !blocks[index].occupied.none(),
                "block {index} storage disagrees with occupancy",
            );
        }
    }

    #[test]
    fn add_get_remove_round_trip() {
        let pool = ComponentPool::<Quad>::new();
        let value = unsafe { pool.add(2, Quad(7)) };
        assert_eq!(unsafe { &*value }.0, 7);
        assert!(pool.has(2));
        assert_eq!(pool.get(2).0, 7);

        unsafe { pool.remove(2) };
        assert!(!pool.has(2));

        unsafe { pool.add(2, Quad(9)) };
        assert_eq!(pool.get(2).0, 9);
    }

    #[test]
    fn block_lifecycle_tracks_occupancy() {
        let pool = ComponentPool::<Quad>::new();

        // Fill block 0 (ids 0..4).
        for id in 0..4 {
            unsafe { pool.add(id, Quad(id)) };
            occupancy_matches_storage(&pool);
        }
        assert_eq!(pool.block_count(), 1);
        assert!(pool.block_is_allocated(0));

        // Id 7 lands in block 1, allocated sparsely.
        unsafe { pool.add(7, Quad(7)) };
        assert_eq!(pool.block_count(), 2);
        assert!(pool.block_is_allocated(1));
        occupancy_matches_storage(&pool);

        // Emptying block 1 frees its storage but keeps the record.
        unsafe { pool.remove(7) };
        assert_eq!(pool.block_count(), 2);
        assert!(!pool.block_is_allocated(1));
        occupancy_matches_storage(&pool);

        // Draining block 0 frees it too.
        for id in 0..4 {
            unsafe { pool.remove(id) };
            occupancy_matches_storage(&pool);
        }
        assert!(!pool.block_is_allocated(0));
    }

    #[test]
    fn degenerate_block_sizes() {
        let singles = ComponentPool::<Single>::new();
        for id in 0..9 {
            unsafe { singles.add(id, Single(id as u8)) };
        }
        assert_eq!(singles.block_count(), 9);
        assert_eq!(singles.get(8).0, 8);
        unsafe { singles.remove(4) };
        assert!(!singles.block_is_allocated(4));
        assert!(singles.block_is_allocated(5));

        let wides = ComponentPool::<Wide>::new();
        unsafe { wides.add(0, Wide(1)) };
        unsafe { wides.add(4095, Wide(2)) };
        unsafe { wides.add(4096, Wide(3)) };
        assert_eq!(wides.block_count(), 2);
        assert_eq!(wides.get(4095).0, 2);
        assert_eq!(wides.get(4096).0, 3);
    }

    #[test]
    fn dropping_pool_drops_occupied_slots_once() {
        DROPS.store(0, Ordering::SeqCst);
        {
            let pool = ComponentPool::<DropProbe>::new();
            for id in [0, 1, 70] {
                unsafe { pool.add(id, DropProbe) };
            }
            unsafe { pool.remove(1) };
            assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[should_panic(expected = "already has")]
    fn double_add_panics() {
        let pool = ComponentPool::<Quad>::new();
        unsafe { pool.add(0, Quad(1)) };
        unsafe { pool.add(0, Quad(2)) };
    }

    #[test]
    #[should_panic(expected = "removing missing")]
    fn remove_absent_panics() {
        let pool = ComponentPool::<Quad>::new();
        unsafe { pool.remove(3) };
    }
}
