//! # Entity Component System
//!
//! Bitset-signature ECS kernel.
//!
//! ## Design
//!
//! - Entities are plain indices handed out from a FIFO pool of fixed size
//! - Each entity carries a 64-bit signature, one bit per component type
//! - Components live in one hash map per type, keyed by entity
//! - Each system caches the ordered set of entities whose signature is a
//!   superset of its own, updated eagerly on every signature change
//! - [`Coordinator`] serialises everything behind a single reader-writer lock

mod component;
mod coordinator;
mod entity;
mod signature;
mod storage;
mod system;

pub use component::{Component, ComponentRegistry, ComponentTypeId};
pub use coordinator::{Coordinator, Kernel};
pub use entity::{Entity, EntityManager};
pub use signature::Signature;
pub use storage::{ComponentStore, ErasedStore};
pub use system::{System, SystemHandle, SystemRegistry};
