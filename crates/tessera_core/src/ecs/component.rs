//! # Component Registry
//!
//! Components are plain data owned by the embedding application. The registry
//! assigns each Rust type a small [`ComponentTypeId`] in first-registration
//! order and owns one [`ComponentStore`] per type.
//!
//! ## Invariants
//! - Identifiers are unique per type and never reused or reassigned.
//! - Registering a type twice returns the identifier it already has.
//! - Every typed operation on an unregistered type fails with
//!   [`KernelError::ComponentNotRegistered`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::entity::Entity;
use super::storage::{ComponentStore, ErasedStore};
use crate::error::{KernelError, KernelResult};

/// Marker trait for components.
///
/// Components should be just plain data. Any `Send + Sync + 'static` type
/// qualifies.
pub trait Component: Send + Sync + 'static {}

impl<T> Component for T where T: Send + Sync + 'static {}

/// Identifier of a registered component type; doubles as its signature bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentTypeId(u8);

impl ComponentTypeId {
    /// Wraps a raw identifier. Only the registry and signature iteration
    /// mint identifiers, and both stay below the signature width.
    #[inline]
    #[must_use]
    pub(crate) const fn new(index: u8) -> Self {
        debug_assert!(index < 64, "component type id must fit in a signature");
        Self(index)
    }

    /// Returns the bit index of this identifier.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Bookkeeping for one registered type.
struct Registration {
    id: ComponentTypeId,
    store: Box<dyn ErasedStore>,
}

/// Owns the type→identifier and type→store registries.
pub struct ComponentRegistry {
    registrations: HashMap<TypeId, Registration>,
    /// Type names indexed by identifier.
    names: Vec<&'static str>,
    capacity: usize,
}

impl ComponentRegistry {
    /// Creates a registry accepting up to `capacity` component types.
    ///
    /// `capacity` is clamped to the signature width.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            registrations: HashMap::new(),
            names: Vec::new(),
            capacity: capacity.min(crate::config::MAX_COMPONENTS),
        }
    }

    /// Maximum number of component types.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.names.len()
    }

    /// Registers `T` and creates its empty store.
    ///
    /// Registering an already registered type returns its existing identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentLimitReached`] when every identifier is taken.
    pub fn register<T: Component>(&mut self) -> KernelResult<ComponentTypeId> {
        let name = type_name::<T>();
        if let Some(existing) = self.registrations.get(&TypeId::of::<T>()) {
            tracing::warn!(component = name, id = existing.id.index(), "component type registered twice");
            return Ok(existing.id);
        }

        let next = self.names.len();
        let index = match u8::try_from(next) {
            Ok(index) if next < self.capacity => index,
            _ => {
                return Err(KernelError::ComponentLimitReached {
                    name,
                    capacity: self.capacity,
                })
            }
        };

        let id = ComponentTypeId::new(index);
        self.registrations.insert(
            TypeId::of::<T>(),
            Registration {
                id,
                store: Box::new(ComponentStore::<T>::new()),
            },
        );
        self.names.push(name);
        tracing::debug!(component = name, id = index, "registered component type");
        Ok(id)
    }

    /// Returns `true` if `T` has been registered.
    #[inline]
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Looks up the identifier of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    #[inline]
    pub fn type_id<T: Component>(&self) -> KernelResult<ComponentTypeId> {
        self.registration::<T>().map(|registration| registration.id)
    }

    /// Rust type name of a registered identifier.
    #[must_use]
    pub fn type_name(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.names.get(usize::from(id.index())).copied()
    }

    /// Attaches `component` to the entity, replacing any previous value.
    ///
    /// Returns the previously attached value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn add<T: Component>(&mut self, entity: Entity, component: T) -> KernelResult<Option<T>> {
        Ok(self.store_mut::<T>()?.insert(entity, component))
    }

    /// Detaches the entity's `T`, returning it. Missing entries are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> KernelResult<Option<T>> {
        Ok(self.store_mut::<T>()?.remove(entity))
    }

    /// Retrieves the entity's `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotFound`] if the entity has no `T`,
    /// or [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn get<T: Component>(&self, entity: Entity) -> KernelResult<&T> {
        self.store::<T>()?
            .get(entity)
            .ok_or_else(|| not_found::<T>(entity))
    }

    /// Retrieves the entity's `T` mutably.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentRegistry::get`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> KernelResult<&mut T> {
        self.store_mut::<T>()?
            .get_mut(entity)
            .ok_or_else(|| not_found::<T>(entity))
    }

    /// Retrieves the entity's `T` if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn try_get<T: Component>(&self, entity: Entity) -> KernelResult<Option<&T>> {
        Ok(self.store::<T>()?.get(entity))
    }

    /// Retrieves the entity's `T` mutably if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> KernelResult<Option<&mut T>> {
        Ok(self.store_mut::<T>()?.get_mut(entity))
    }

    /// Returns `true` if the entity has a `T` in storage.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn has<T: Component>(&self, entity: Entity) -> KernelResult<bool> {
        Ok(self.store::<T>()?.contains(entity))
    }

    /// Removes the entity from every store.
    ///
    /// Cost is linear in the number of registered types.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        for registration in self.registrations.values_mut() {
            registration.store.on_entity_destroyed(entity);
        }
    }

    /// Total number of component values held across all stores.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.registrations
            .values()
            .map(|registration| registration.store.len())
            .sum()
    }

    /// Read access to the typed store of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ComponentNotRegistered`] if `T` is unknown.
    pub fn store<T: Component>(&self) -> KernelResult<&ComponentStore<T>> {
        self.registration::<T>()?
            .store
            .as_any()
            .downcast_ref()
            .ok_or_else(not_registered::<T>)
    }

    fn store_mut<T: Component>(&mut self) -> KernelResult<&mut ComponentStore<T>> {
        self.registrations
            .get_mut(&TypeId::of::<T>())
            .ok_or_else(not_registered::<T>)?
            .store
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(not_registered::<T>)
    }

    fn registration<T: Component>(&self) -> KernelResult<&Registration> {
        self.registrations
            .get(&TypeId::of::<T>())
            .ok_or_else(not_registered::<T>)
    }
}

fn not_found<T: Component>(entity: Entity) -> KernelError {
    KernelError::ComponentNotFound {
        entity,
        name: type_name::<T>(),
    }
}

fn not_registered<T: Component>() -> KernelError {
    KernelError::ComponentNotRegistered {
        name: type_name::<T>(),
    }
}
