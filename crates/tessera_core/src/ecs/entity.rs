//! # Entity Management
//!
//! Entities are plain slot indices with no data of their own. The pool is
//! fixed at creation: every identifier owns one signature slot for its whole
//! possible lifetime, and destroyed identifiers go back to the end of a FIFO
//! queue so the most recently freed slot is the last one handed out again.

use std::collections::VecDeque;
use std::fmt;

use super::signature::Signature;
use crate::error::{KernelError, KernelResult};

/// Opaque, recyclable entity identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the slot index of this entity.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the identifier pool and one signature per slot.
///
/// All memory is allocated up front; `create` and `destroy` are O(1).
pub struct EntityManager {
    /// Identifiers ready to be handed out, oldest first.
    available: VecDeque<Entity>,
    /// Signature per slot, indexed by entity.
    signatures: Box<[Signature]>,
    /// Whether the slot is currently handed out by `create`.
    issued: Box<[bool]>,
    /// Entities handed out and not yet destroyed.
    living_count: usize,
}

impl EntityManager {
    /// Creates a pool with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        let Ok(last) = u32::try_from(capacity) else {
            panic!("Capacity cannot exceed u32::MAX");
        };

        Self {
            available: (0..last).map(Entity).collect(),
            signatures: vec![Signature::EMPTY; capacity].into_boxed_slice(),
            issued: vec![false; capacity].into_boxed_slice(),
            living_count: 0,
        }
    }

    /// Returns the number of slots in the pool.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.signatures.len()
    }

    /// Returns the number of entities created and not yet destroyed.
    #[inline]
    #[must_use]
    pub const fn living_count(&self) -> usize {
        self.living_count
    }

    /// Takes the next identifier from the pool.
    ///
    /// The new entity always starts with an empty signature.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CapacityExhausted`] when every slot is in use.
    pub fn create(&mut self) -> KernelResult<Entity> {
        let capacity = self.capacity();
        if self.living_count >= capacity {
            tracing::warn!(living = self.living_count, capacity, "entity pool exhausted");
            return Err(KernelError::CapacityExhausted {
                living: self.living_count,
                capacity,
            });
        }

        let entity = self
            .available
            .pop_front()
            .ok_or(KernelError::CapacityExhausted {
                living: self.living_count,
                capacity,
            })?;
        self.issued[entity.index()] = true;
        self.living_count += 1;
        tracing::trace!(%entity, living = self.living_count, "entity created");
        Ok(entity)
    }

    /// Clears the entity's signature and returns its identifier to the pool.
    ///
    /// An entity whose signature is already empty is left alone, so
    /// destroying twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::EntityOutOfRange`] for identifiers outside the
    /// pool, [`KernelError::DestroyUnderflow`] if the live count is already
    /// zero and [`KernelError::EntityNotAlive`] if the slot carries a
    /// signature but was never handed out. The pool is untouched on error.
    pub fn destroy(&mut self, entity: Entity) -> KernelResult<()> {
        let slot = self.slot(entity)?;
        if self.signatures[slot].is_empty() {
            return Ok(());
        }
        if self.living_count == 0 {
            return Err(KernelError::DestroyUnderflow { entity });
        }
        if !self.issued[slot] {
            return Err(KernelError::EntityNotAlive { entity });
        }

        self.signatures[slot] = Signature::EMPTY;
        self.issued[slot] = false;
        self.available.push_back(entity);
        self.living_count -= 1;
        tracing::trace!(%entity, living = self.living_count, "entity destroyed");
        Ok(())
    }

    /// Returns `true` if the identifier is inside the pool and its signature
    /// is non-empty.
    #[inline]
    #[must_use]
    pub fn exists(&self, entity: Entity) -> bool {
        self.signatures
            .get(entity.index())
            .is_some_and(|signature| !signature.is_empty())
    }

    /// Returns `true` if the identifier is currently handed out, whether or
    /// not it owns any component yet.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.issued.get(entity.index()).copied().unwrap_or(false)
    }

    /// Checks that the identifier is inside the pool and currently handed out.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::EntityOutOfRange`] for identifiers outside the
    /// pool and [`KernelError::EntityNotAlive`] for slots sitting in the queue.
    pub fn ensure_alive(&self, entity: Entity) -> KernelResult<()> {
        let slot = self.slot(entity)?;
        if self.issued[slot] {
            Ok(())
        } else {
            Err(KernelError::EntityNotAlive { entity })
        }
    }

    /// Overwrites the signature of a slot. Liveness is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::EntityOutOfRange`] for identifiers outside the pool.
    #[inline]
    pub fn set_signature(&mut self, entity: Entity, signature: Signature) -> KernelResult<()> {
        let slot = self.slot(entity)?;
        self.signatures[slot] = signature;
        Ok(())
    }

    /// Reads the signature of a slot. Liveness is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::EntityOutOfRange`] for identifiers outside the pool.
    #[inline]
    pub fn signature(&self, entity: Entity) -> KernelResult<Signature> {
        let slot = self.slot(entity)?;
        Ok(self.signatures[slot])
    }

    /// Every entity that currently exists, in slot order.
    ///
    /// This scans the whole pool, so it costs O(capacity).
    #[must_use]
    pub fn all(&self) -> Vec<Entity> {
        self.iter_signatures().map(|(entity, _)| entity).collect()
    }

    /// Iterates over `(entity, signature)` for every existing entity.
    pub fn iter_signatures(&self) -> impl Iterator<Item = (Entity, Signature)> + '_ {
        (0u32..)
            .zip(self.signatures.iter())
            .filter(|(_, signature)| !signature.is_empty())
            .map(|(raw, signature)| (Entity(raw), *signature))
    }

    #[inline]
    fn slot(&self, entity: Entity) -> KernelResult<usize> {
        let slot = entity.index();
        if slot < self.signatures.len() {
            Ok(slot)
        } else {
            Err(KernelError::EntityOutOfRange {
                entity,
                capacity: self.signatures.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentTypeId;

    fn occupied() -> Signature {
        Signature::EMPTY.with(ComponentTypeId::new(0))
    }

    #[test]
    fn test_create_hands_out_fifo_order() {
        let mut manager = EntityManager::new(3);
        assert_eq!(manager.create().unwrap(), Entity(0));
        assert_eq!(manager.create().unwrap(), Entity(1));
        assert_eq!(manager.living_count(), 2);
    }

    #[test]
    fn test_capacity_and_recycling() {
        let mut manager = EntityManager::new(2);
        let e0 = manager.create().unwrap();
        let e1 = manager.create().unwrap();
        assert_ne!(e0, e1);

        assert_eq!(
            manager.create(),
            Err(KernelError::CapacityExhausted { living: 2, capacity: 2 })
        );

        manager.set_signature(e0, occupied()).unwrap();
        manager.destroy(e0).unwrap();
        assert_eq!(manager.create().unwrap(), e0);
    }

    #[test]
    fn test_recycled_slot_goes_to_back_of_queue() {
        let mut manager = EntityManager::new(3);
        let e0 = manager.create().unwrap();
        manager.set_signature(e0, occupied()).unwrap();
        manager.destroy(e0).unwrap();

        // Slots 1 and 2 were queued before slot 0 came back.
        assert_eq!(manager.create().unwrap(), Entity(1));
        assert_eq!(manager.create().unwrap(), Entity(2));
        assert_eq!(manager.create().unwrap(), e0);
    }

    #[test]
    fn test_exists_follows_signature() {
        let mut manager = EntityManager::new(4);
        let entity = manager.create().unwrap();
        assert!(!manager.exists(entity));

        manager.set_signature(entity, occupied()).unwrap();
        assert!(manager.exists(entity));
        assert_eq!(manager.all(), vec![entity]);

        manager.destroy(entity).unwrap();
        assert!(!manager.exists(entity));
        assert!(manager.signature(entity).unwrap().is_empty());
        assert!(!manager.exists(Entity(99)));
    }

    #[test]
    fn test_double_destroy_is_noop() {
        let mut manager = EntityManager::new(2);
        let entity = manager.create().unwrap();
        manager.set_signature(entity, occupied()).unwrap();

        manager.destroy(entity).unwrap();
        manager.destroy(entity).unwrap();
        assert_eq!(manager.living_count(), 0);
    }

    #[test]
    fn test_destroy_underflow_is_an_error() {
        let mut manager = EntityManager::new(2);
        // Signature written on a slot that was never created.
        manager.set_signature(Entity(1), occupied()).unwrap();
        assert_eq!(
            manager.destroy(Entity(1)),
            Err(KernelError::DestroyUnderflow { entity: Entity(1) })
        );
    }

    #[test]
    fn test_unissued_slot_is_never_requeued() {
        let mut manager = EntityManager::new(2);
        let e0 = manager.create().unwrap();
        let stray = Entity::from_raw(1);
        assert_eq!(stray.raw(), 1);
        assert!(!manager.is_alive(stray));
        assert_eq!(manager.ensure_alive(stray), Err(KernelError::EntityNotAlive { entity: stray }));

        manager.set_signature(stray, occupied()).unwrap();
        assert_eq!(manager.destroy(stray), Err(KernelError::EntityNotAlive { entity: stray }));
        assert_eq!(manager.living_count(), 1);

        let e1 = manager.create().unwrap();
        assert_eq!(e1, stray);
        assert_ne!(e0, e1);
        assert!(manager.create().is_err());
    }

    #[test]
    fn test_alive_tracks_create_and_destroy() {
        let mut manager = EntityManager::new(2);
        let entity = manager.create().unwrap();
        assert!(manager.is_alive(entity));
        assert!(manager.ensure_alive(entity).is_ok());

        manager.set_signature(entity, occupied()).unwrap();
        manager.destroy(entity).unwrap();
        assert!(!manager.is_alive(entity));
        assert!(!manager.is_alive(Entity(7)));
    }

    #[test]
    fn test_out_of_range_access() {
        let mut manager = EntityManager::new(2);
        assert!(matches!(
            manager.signature(Entity(2)),
            Err(KernelError::EntityOutOfRange { capacity: 2, .. })
        ));
        assert!(manager.set_signature(Entity(5), occupied()).is_err());
        assert!(manager.destroy(Entity(5)).is_err());
    }
}
