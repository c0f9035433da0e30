//! # tickworld
//!
//! A parallel Entity-Component-System runtime for interactive simulations
//! that update large populations of heterogeneous objects at frame rate.
//!
//! ## Design Goals
//! - Paged, cache-friendly component storage indexed directly by entity id
//! - Bitmask-driven matching and scheduling (one `u64` word per entity)
//! - Conflict-aware concurrent system execution without a global instance
//! - Deferred entity visibility with explicit tick boundaries
//!
//! ## Model
//! Consumers define plain data types (components) and free functions or
//! closures (systems). A [`World`] stores component data in per-type pools
//! of fixed-size blocks, iterates over the entities carrying a required
//! component set, and dispatches systems concurrently when their declared
//! component access does not conflict.
//!
//! ```
//! use tickworld::prelude::*;
//!
//! struct Position { x: f32, y: f32 }
//! struct Velocity { x: f32, y: f32 }
//! impl Component for Position {}
//! impl Component for Velocity {}
//!
//! let world = World::new();
//! let entity = world.create_entity();
//! entity.add(Position { x: 0.0, y: 0.0 });
//! entity.add(Velocity { x: 1.0, y: 2.0 });
//! world.finish_tick();
//!
//! let dt = 0.5;
//! world.tick_system::<(Write<Position>, Read<Velocity>), _, _>(
//!     Execution::Inline,
//!     Iteration::Sequential,
//!     move |position: &mut Position, velocity: &Velocity| {
//!         position.x += velocity.x * dt;
//!         position.y += velocity.y * dt;
//!     },
//! );
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;

pub use engine::access::{Access, AccessList, Read, Write};
pub use engine::component::{component_id_of, Component, ComponentSet};
pub use engine::entity::EntityRegistry;
pub use engine::pool::ComponentPool;
pub use engine::system::{Execution, Iteration, System, WithHandle, WithoutHandle};
pub use engine::types::{ComponentId, ComponentMask, EntityId, INVALID_ENTITY, MAX_COMPONENTS};
pub use engine::world::{EntitiesWith, EntityHandle, World};

/// Commonly used runtime types.
///
/// Import with:
/// ```rust
/// use tickworld::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Component, ComponentMask, EntityHandle, EntityId, Execution, Iteration, Read, World, Write,
    };
}
