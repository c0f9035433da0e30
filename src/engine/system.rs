//! System Abstractions
//!
//! A **system** is a callable executed once per matching entity per
//! dispatch. Systems:
//! - declare which components they read and write via an access list,
//! - are scheduled against running workers based on write conflicts,
//! - may execute inline or on a background worker,
//! - may iterate matching entities sequentially or in parallel.
//!
//! ## Callable shapes
//!
//! For an access list `(A0, ..., Ak)`, the callable accepts exactly one of:
//!
//! - `(&(mut) C0, ..., &(mut) Ck)` — component references only,
//! - `(EntityHandle, &(mut) C0, ..., &(mut) Ck)` — the matched entity's
//!   handle first.
//!
//! where each reference is mutable exactly when the corresponding marker
//! is [`Write`](crate::Write). Mismatches are compile errors. Extra state
//! a system needs (delta time, tuning constants) is captured by the
//! closure.
//!
//! The two shapes are distinguished by the [`WithHandle`] /
//! [`WithoutHandle`] marker parameter so both blanket implementations can
//! coexist; a given closure satisfies exactly one, so the marker is
//! inferred at the dispatch call.
//!
//! ## Thread Safety
//!
//! Systems must be `Send + Sync + 'static`: background dispatch moves the
//! callable onto a worker thread, and parallel iteration shares it across
//! the rayon pool.

use crate::engine::access::{Access, AccessList};
use crate::engine::world::EntityHandle;

/// Where a dispatched system runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Execution {
    /// Run on the calling thread; the dispatch returns when iteration
    /// completes.
    Inline,
    /// Package the iteration as a worker thread and return immediately.
    /// The worker is joined at the next conflicting dispatch or at the
    /// tick boundary.
    Background,
}

/// How a dispatched system visits matching entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Iteration {
    /// Ascending entity-id order on a single thread.
    Sequential,
    /// Partitioned across the rayon pool; complete but unordered. The
    /// caller asserts the system does not touch other entities' components
    /// of its own access set.
    Parallel,
}

/// A callable invocable once per matching entity.
///
/// `Marker` is [`WithHandle`] or [`WithoutHandle`] depending on whether
/// the callable takes the entity handle as its first parameter; it is
/// inferred, never named at call sites.
pub trait System<A: AccessList, Marker>: Send + Sync + 'static {
    /// Invokes the callable for one matching entity.
    fn run<'w>(&self, entity: EntityHandle<'w>, item: A::Item<'w>);
}

/// Marker for callables taking `(EntityHandle, components...)`.
pub struct WithHandle(());

/// Marker for callables taking `(components...)` only.
pub struct WithoutHandle(());

macro_rules! impl_system {
    ($($access:ident => $value:ident),+) => {
        impl<Func, $($access),+> System<($($access,)+), WithoutHandle> for Func
        where
            $($access: Access,)+
            Func: for<'w> Fn($($access::Fetched<'w>),+) + Send + Sync + 'static,
        {
            fn run<'w>(
                &self,
                _entity: EntityHandle<'w>,
                item: <($($access,)+) as AccessList>::Item<'w>,
            ) {
                let ($($value,)+) = item;
                self($($value),+)
            }
        }

        impl<Func, $($access),+> System<($($access,)+), WithHandle> for Func
        where
            $($access: Access,)+
            Func: for<'w> Fn(EntityHandle<'w>, $($access::Fetched<'w>),+) + Send + Sync + 'static,
        {
            fn run<'w>(
                &self,
                entity: EntityHandle<'w>,
                item: <($($access,)+) as AccessList>::Item<'w>,
            ) {
                let ($($value,)+) = item;
                self(entity, $($value),+)
            }
        }
    };
}

impl_system!(A0 => c0);
impl_system!(A0 => c0, A1 => c1);
impl_system!(A0 => c0, A1 => c1, A2 => c2);
impl_system!(A0 => c0, A1 => c1, A2 => c2, A3 => c3);
impl_system!(A0 => c0, A1 => c1, A2 => c2, A3 => c3, A4 => c4);
impl_system!(A0 => c0, A1 => c1, A2 => c2, A3 => c3, A4 => c4, A5 => c5);
impl_system!(A0 => c0, A1 => c1, A2 => c2, A3 => c3, A4 => c4, A5 => c5, A6 => c6);
impl_system!(A0 => c0, A1 => c1, A2 => c2, A3 => c3, A4 => c4, A5 => c5, A6 => c6, A7 => c7);
