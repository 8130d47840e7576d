//! # Tessera Core
//!
//! Thread-safe Entity Component System kernel:
//! - Fixed-capacity entity pool with FIFO identifier recycling
//! - Bitset signatures, up to 64 component types
//! - Systems with eagerly maintained membership sets
//! - One reader-writer lock around the whole kernel
//!
//! ## Architecture Rules
//!
//! 1. **One lock domain** - composite operations run under a single acquisition
//! 2. **Membership is never stale** - every signature change reaches every system
//! 3. **Unregistered types are errors** - lookups never fabricate storage
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{Coordinator, KernelConfig, Signature};
//!
//! struct Position(f32, f32);
//!
//! let world = Coordinator::init(KernelConfig::default()).unwrap();
//! let position = world.register_component::<Position>().unwrap();
//!
//! let entity = world.create_entity().unwrap();
//! world.add_component(entity, Position(0.0, 1.0)).unwrap();
//!
//! assert!(world.entity_signature(entity).unwrap().test(position));
//! assert_eq!(world.entities_matching(Signature::EMPTY.with(position)), vec![entity]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod sync;

pub use config::{KernelConfig, DEFAULT_TICK_RATE, MAX_COMPONENTS, MAX_ENTITIES};
pub use ecs::{
    Component, ComponentRegistry, ComponentStore, ComponentTypeId, Coordinator, Entity,
    EntityManager, ErasedStore, Kernel, Signature, System, SystemHandle, SystemRegistry,
};
pub use error::{KernelError, KernelResult};
pub use sync::{Job, TickThrottle};
