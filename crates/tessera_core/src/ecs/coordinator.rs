//! # Coordinator
//!
//! The application-facing facade over the three managers.
//!
//! ## Layers
//!
//! ```text
//!   application threads
//!          │
//!          ▼
//!   ┌──────────────────────────────┐
//!   │ Coordinator                  │  every method takes the lock once
//!   │   RwLock<Kernel>             │
//!   └──────────────┬───────────────┘
//!                  │ guard
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │ Kernel (unlocked)            │  reachable only through a guard
//!   │   EntityManager              │
//!   │   ComponentRegistry          │
//!   │   SystemRegistry             │
//!   └──────────────────────────────┘
//! ```
//!
//! Composite operations (`add_component`, `remove_component`,
//! `destroy_entity`) update storage, the entity signature and system
//! membership inside one acquisition, so no thread can observe a component
//! whose system membership is stale.
//!
//! Composite queries such as [`Kernel::entities_with`] call the other kernel
//! queries directly. There is no re-entrant locking and no "already locked"
//! flag: code that needs several steps under one acquisition takes
//! [`Coordinator::lock`] or [`Coordinator::read`] and works on the [`Kernel`].
//!
//! ## Lock modes
//!
//! Mutations and anything that hands out `&mut` take the exclusive mode.
//! Pure queries take the shared mode and may run concurrently.

use std::any::type_name;

use parking_lot::{MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::component::{Component, ComponentRegistry, ComponentTypeId};
use super::entity::{Entity, EntityManager};
use super::signature::Signature;
use super::system::{System, SystemHandle, SystemRegistry};
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};

/// The three managers, without any locking.
///
/// A `Kernel` is only reachable through a guard returned by
/// [`Coordinator::lock`] or [`Coordinator::read`], so holding one proves the
/// lock is held.
pub struct Kernel {
    entities: EntityManager,
    components: ComponentRegistry,
    systems: SystemRegistry,
}

impl Kernel {
    fn new(config: &KernelConfig) -> Self {
        Self {
            entities: EntityManager::new(config.entity_capacity),
            components: ComponentRegistry::new(config.component_capacity),
            systems: SystemRegistry::new(config.default_tick_rate),
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// See [`Coordinator::create_entity`].
    ///
    /// # Errors
    ///
    /// Fails when the entity pool is exhausted.
    pub fn create_entity(&mut self) -> KernelResult<Entity> {
        self.entities.create()
    }

    /// See [`Coordinator::destroy_entity`].
    ///
    /// # Errors
    ///
    /// Fails for identifiers outside the pool or on live-count underflow.
    pub fn destroy_entity(&mut self, entity: Entity) -> KernelResult<()> {
        self.entities.destroy(entity)?;
        self.components.on_entity_destroyed(entity);
        self.systems.on_entity_destroyed(entity);
        Ok(())
    }

    /// See [`Coordinator::entity_exists`].
    #[must_use]
    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.entities.exists(entity)
    }

    /// See [`Coordinator::entities`].
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.all()
    }

    /// Number of entities created and not yet destroyed.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.entities.living_count()
    }

    /// Size of the entity pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// See [`Coordinator::entity_signature`].
    ///
    /// # Errors
    ///
    /// Fails for identifiers outside the pool.
    pub fn entity_signature(&self, entity: Entity) -> KernelResult<Signature> {
        self.entities.signature(entity)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// See [`Coordinator::register_component`].
    ///
    /// # Errors
    ///
    /// Fails when the component type limit is reached.
    pub fn register_component<T: Component>(&mut self) -> KernelResult<ComponentTypeId> {
        self.components.register::<T>()
    }

    /// See [`Coordinator::component_type_id`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn component_type_id<T: Component>(&self) -> KernelResult<ComponentTypeId> {
        self.components.type_id::<T>()
    }

    /// See [`Coordinator::add_component`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered, the entity is outside the pool or
    /// the entity is not alive. Nothing is modified on failure.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> KernelResult<Option<T>> {
        let id = self.components.type_id::<T>()?;
        self.entities.ensure_alive(entity)?;
        let mut signature = self.entities.signature(entity)?;

        let previous = self.components.add(entity, component)?;
        signature.set(id);
        self.entities.set_signature(entity, signature)?;
        self.systems.on_signature_changed(entity, signature);
        Ok(previous)
    }

    /// See [`Coordinator::remove_component`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered, the entity is outside the pool or
    /// the entity is not alive. Nothing is modified on failure.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> KernelResult<Option<T>> {
        let id = self.components.type_id::<T>()?;
        self.entities.ensure_alive(entity)?;
        let mut signature = self.entities.signature(entity)?;

        let removed = self.components.remove::<T>(entity)?;
        signature.clear(id);
        self.entities.set_signature(entity, signature)?;
        self.systems.on_signature_changed(entity, signature);
        Ok(removed)
    }

    /// Reads the entity's `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered or the entity has no `T`.
    pub fn component<T: Component>(&self, entity: Entity) -> KernelResult<&T> {
        self.components.get::<T>(entity)
    }

    /// Mutably borrows the entity's `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered or the entity has no `T`.
    pub fn component_mut<T: Component>(&mut self, entity: Entity) -> KernelResult<&mut T> {
        self.components.get_mut::<T>(entity)
    }

    /// Reads the entity's `T` if it has one.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn try_component<T: Component>(&self, entity: Entity) -> KernelResult<Option<&T>> {
        self.components.try_get::<T>(entity)
    }

    /// Mutably borrows the entity's `T` if it has one.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn try_component_mut<T: Component>(&mut self, entity: Entity) -> KernelResult<Option<&mut T>> {
        self.components.try_get_mut::<T>(entity)
    }

    /// See [`Coordinator::has_component`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered or the entity is outside the pool.
    pub fn has_component<T: Component>(&self, entity: Entity) -> KernelResult<bool> {
        let id = self.components.type_id::<T>()?;
        Ok(self.entities.signature(entity)?.test(id))
    }

    /// See [`Coordinator::has_component_pair`].
    ///
    /// # Errors
    ///
    /// Fails if either type is not registered or either entity is outside the pool.
    pub fn has_component_pair<A: Component, B: Component>(&self, first: Entity, second: Entity) -> KernelResult<bool> {
        Ok((self.has_component::<A>(first)? && self.has_component::<B>(second)?)
            || (self.has_component::<B>(first)? && self.has_component::<A>(second)?))
    }

    /// See [`Coordinator::entities_with`].
    ///
    /// # Errors
    ///
    /// Fails if either type is not registered.
    pub fn entities_with<A: Component, B: Component>(&self) -> KernelResult<Vec<Entity>> {
        let required = Signature::EMPTY
            .with(self.components.type_id::<A>()?)
            .with(self.components.type_id::<B>()?);
        Ok(self.entities_matching(required))
    }

    /// See [`Coordinator::entities_matching`].
    #[must_use]
    pub fn entities_matching(&self, required: Signature) -> Vec<Entity> {
        self.entities
            .iter_signatures()
            .filter(|(_, signature)| signature.matches(required))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Read access to the component registry.
    #[must_use]
    pub fn component_registry(&self) -> &ComponentRegistry {
        &self.components
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// See [`Coordinator::register_system`].
    ///
    /// # Errors
    ///
    /// Only fails if the registry loses track of the system it just stored.
    pub fn register_system<T: System + Default>(&mut self) -> KernelResult<SystemHandle<T>> {
        let handle = self.systems.register::<T>();
        self.systems.resync::<T, _>(self.entities.iter_signatures())?;
        Ok(handle)
    }

    /// See [`Coordinator::register_system_with`].
    ///
    /// # Errors
    ///
    /// Only fails if the registry loses track of the system it just stored.
    pub fn register_system_with<T: System>(&mut self, system: T) -> KernelResult<SystemHandle<T>> {
        let handle = self.systems.register_with(system);
        self.systems.resync::<T, _>(self.entities.iter_signatures())?;
        Ok(handle)
    }

    /// See [`Coordinator::get_system`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn system<T: System>(&self) -> KernelResult<SystemHandle<T>> {
        self.systems.get::<T>()
    }

    /// See [`Coordinator::set_system_signature`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn set_system_signature<T: System>(&mut self, signature: Signature) -> KernelResult<()> {
        self.systems.set_signature::<T>(signature)?;
        self.systems.resync::<T, _>(self.entities.iter_signatures())
    }

    /// See [`Coordinator::system_signature`].
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn system_signature<T: System>(&self) -> KernelResult<Signature> {
        self.systems.signature::<T>()
    }
}

/// Thread-safe facade over entities, components and systems.
///
/// Share it between threads with `Arc<Coordinator>`. Every method acquires
/// the single lock once; no method may be called while the same thread
/// holds a guard from [`Coordinator::lock`] or [`Coordinator::read`].
pub struct Coordinator {
    kernel: RwLock<Kernel>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    /// Creates a coordinator with the default configuration
    /// (5000 entities, 64 component types).
    #[must_use]
    pub fn new() -> Self {
        Self {
            kernel: RwLock::new(Kernel::new(&KernelConfig::default())),
        }
    }

    /// Validates `config` and allocates the three managers.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`]
    /// if the configuration is out of bounds.
    pub fn init(config: KernelConfig) -> KernelResult<Self> {
        config.validate()?;
        tracing::debug!(
            entity_capacity = config.entity_capacity,
            component_capacity = config.component_capacity,
            default_tick_rate = config.default_tick_rate,
            "coordinator initialised"
        );
        Ok(Self {
            kernel: RwLock::new(Kernel::new(&config)),
        })
    }

    /// Takes the lock in exclusive mode for a batch of operations.
    ///
    /// Calling any other `Coordinator` method on the same thread while the
    /// guard is alive deadlocks.
    pub fn lock(&self) -> RwLockWriteGuard<'_, Kernel> {
        self.kernel.write()
    }

    /// Takes the lock in shared mode for a batch of queries.
    ///
    /// Same re-entrancy rule as [`Coordinator::lock`].
    pub fn read(&self) -> RwLockReadGuard<'_, Kernel> {
        self.kernel.read()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with an empty signature.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CapacityExhausted`]
    /// when the pool is full.
    pub fn create_entity(&self) -> KernelResult<Entity> {
        self.kernel.write().create_entity()
    }

    /// Destroys an entity, dropping its components and system memberships.
    ///
    /// Destroying an entity whose signature is already empty is a no-op.
    ///
    /// # Errors
    ///
    /// Fails for identifiers outside the pool or on live-count underflow.
    pub fn destroy_entity(&self, entity: Entity) -> KernelResult<()> {
        self.kernel.write().destroy_entity(entity)
    }

    /// Returns `true` if the entity is inside the pool and owns at least one
    /// component.
    #[must_use]
    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.kernel.read().entity_exists(entity)
    }

    /// Every existing entity. Scans the whole pool.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.kernel.read().entities()
    }

    /// Number of entities created and not yet destroyed.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.kernel.read().living_count()
    }

    /// Size of the entity pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.kernel.read().capacity()
    }

    /// Current signature of the entity.
    ///
    /// # Errors
    ///
    /// Fails for identifiers outside the pool.
    pub fn entity_signature(&self, entity: Entity) -> KernelResult<Signature> {
        self.kernel.read().entity_signature(entity)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers `T`, returning its identifier. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails when the component type limit is reached.
    pub fn register_component<T: Component>(&self) -> KernelResult<ComponentTypeId> {
        self.kernel.write().register_component::<T>()
    }

    /// Identifier (signature bit) of `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn component_type_id<T: Component>(&self) -> KernelResult<ComponentTypeId> {
        self.kernel.read().component_type_id::<T>()
    }

    /// Attaches `component` to the entity and updates system membership.
    ///
    /// An existing `T` is replaced and returned.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered, the entity is outside the pool or
    /// the entity is not alive.
    pub fn add_component<T: Component>(&self, entity: Entity, component: T) -> KernelResult<Option<T>> {
        self.kernel.write().add_component(entity, component)
    }

    /// Detaches the entity's `T` and updates system membership.
    ///
    /// Removing a component the entity does not have is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered, the entity is outside the pool or
    /// the entity is not alive.
    pub fn remove_component<T: Component>(&self, entity: Entity) -> KernelResult<Option<T>> {
        self.kernel.write().remove_component::<T>(entity)
    }

    /// Borrows the entity's `T` mutably. The lock is held in exclusive mode
    /// until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered or the entity has no `T`.
    pub fn get_component<T: Component>(&self, entity: Entity) -> KernelResult<MappedRwLockWriteGuard<'_, T>> {
        let kernel = self.kernel.write();
        kernel.component::<T>(entity)?;
        RwLockWriteGuard::try_map(kernel, |kernel| kernel.component_mut::<T>(entity).ok()).map_err(|_| {
            KernelError::ComponentNotFound {
                entity,
                name: type_name::<T>(),
            }
        })
    }

    /// Borrows the entity's `T` mutably if it has one.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn try_get_component<T: Component>(
        &self,
        entity: Entity,
    ) -> KernelResult<Option<MappedRwLockWriteGuard<'_, T>>> {
        let mut kernel = self.kernel.write();
        if kernel.try_component_mut::<T>(entity)?.is_none() {
            return Ok(None);
        }
        Ok(RwLockWriteGuard::try_map(kernel, |kernel| {
            kernel.try_component_mut::<T>(entity).ok().flatten()
        })
        .ok())
    }

    /// Runs `f` on the entity's `T` under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered or the entity has no `T`.
    pub fn with_component<T, R, F>(&self, entity: Entity, f: F) -> KernelResult<R>
    where
        T: Component,
        F: FnOnce(&mut T) -> R,
    {
        let mut kernel = self.kernel.write();
        kernel.component_mut::<T>(entity).map(f)
    }

    /// Returns `true` if the entity's signature has the bit of `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered or the entity is outside the pool.
    pub fn has_component<T: Component>(&self, entity: Entity) -> KernelResult<bool> {
        self.kernel.read().has_component::<T>(entity)
    }

    /// Returns `true` if `A` and `B` are spread across the two entities in
    /// either order.
    ///
    /// # Errors
    ///
    /// Fails if either type is not registered or either entity is outside the pool.
    pub fn has_component_pair<A: Component, B: Component>(&self, first: Entity, second: Entity) -> KernelResult<bool> {
        self.kernel.read().has_component_pair::<A, B>(first, second)
    }

    /// Every existing entity owning both `A` and `B`, in slot order.
    ///
    /// # Errors
    ///
    /// Fails if either type is not registered.
    pub fn entities_with<A: Component, B: Component>(&self) -> KernelResult<Vec<Entity>> {
        self.kernel.read().entities_with::<A, B>()
    }

    /// Every existing entity whose signature is a superset of `required`.
    #[must_use]
    pub fn entities_matching(&self, required: Signature) -> Vec<Entity> {
        self.kernel.read().entities_matching(required)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Constructs and registers the single instance of `T`.
    ///
    /// Registering again returns the existing handle. The new system's
    /// membership is computed against the entities that already exist.
    ///
    /// # Errors
    ///
    /// Only fails if the registry loses track of the system it just stored.
    pub fn register_system<T: System + Default>(&self) -> KernelResult<SystemHandle<T>> {
        self.kernel.write().register_system::<T>()
    }

    /// Registers a caller-constructed instance of `T`.
    ///
    /// # Errors
    ///
    /// Only fails if the registry loses track of the system it just stored.
    pub fn register_system_with<T: System>(&self, system: T) -> KernelResult<SystemHandle<T>> {
        self.kernel.write().register_system_with(system)
    }

    /// Handle of the registered `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::SystemNotRegistered`]
    /// if `T` is unknown.
    pub fn get_system<T: System>(&self) -> KernelResult<SystemHandle<T>> {
        self.kernel.read().system::<T>()
    }

    /// Declares the components `T` requires and recomputes its membership.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn set_system_signature<T: System>(&self, signature: Signature) -> KernelResult<()> {
        self.kernel.write().set_system_signature::<T>(signature)
    }

    /// Required signature of `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not registered.
    pub fn system_signature<T: System>(&self) -> KernelResult<Signature> {
        self.kernel.read().system_signature::<T>()
    }
}
