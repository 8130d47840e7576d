//! # Systems
//!
//! A system is behaviour plus a membership cache: the set of entities whose
//! signature currently satisfies the system's required signature.
//!
//! Membership is recomputed incrementally on every signature change (add or
//! remove component, destroy entity), so running a system costs nothing in
//! matching. The bit test is paid on the rare mutation path instead of the
//! per-frame read path.
//!
//! ## Ownership
//!
//! Exactly one instance exists per system type. It is created at
//! registration and lives as long as the registry or any outstanding
//! [`SystemHandle`], whichever is longer. Systems are never replaced.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use super::coordinator::Coordinator;
use super::entity::Entity;
use super::signature::Signature;
use crate::error::{KernelError, KernelResult};
use crate::sync::{Job, TickThrottle};

/// Objects of this trait represent *system* of ECS.
///
/// Both hooks receive the coordinator and a snapshot of the system's
/// members. The snapshot is taken before the call, so a system is free to
/// create, destroy or mutate entities through `world`.
pub trait System: Send + Sync + 'static {
    /// Advances the system by `delta_time` seconds.
    fn update(&self, _world: &Coordinator, _entities: &[Entity], _delta_time: f32) {}

    /// Draws the system's members.
    fn render(&self, _world: &Coordinator, _entities: &[Entity]) {}
}

/// The shared allocation behind a registered system.
struct SystemSlot<T: System> {
    system: T,
    members: RwLock<BTreeSet<Entity>>,
    throttle: TickThrottle,
}

impl<T: System> SystemSlot<T> {
    fn snapshot(&self) -> Vec<Entity> {
        self.members.read().iter().copied().collect()
    }
}

/// Type-erased access to a system's membership cache.
trait MembershipCache: Send + Sync {
    fn admit(&self, entity: Entity);
    fn evict(&self, entity: Entity);
    fn replace(&self, members: BTreeSet<Entity>);
}

impl<T: System> MembershipCache for SystemSlot<T> {
    fn admit(&self, entity: Entity) {
        self.members.write().insert(entity);
    }

    fn evict(&self, entity: Entity) {
        self.members.write().remove(&entity);
    }

    fn replace(&self, members: BTreeSet<Entity>) {
        *self.members.write() = members;
    }
}

/// Shared, reference-counted handle to a registered system.
pub struct SystemHandle<T: System> {
    slot: Arc<SystemSlot<T>>,
}

impl<T: System> Clone for SystemHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: System> Deref for SystemHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.system
    }
}

impl<T: System> SystemHandle<T> {
    /// Snapshot of the current members, in ascending entity order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.slot.snapshot()
    }

    /// Returns `true` if the entity is currently a member.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot.members.read().contains(&entity)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slot.members.read().len()
    }

    /// Returns `true` if the system has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.members.read().is_empty()
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Runs [`System::update`] on the calling thread.
    pub fn update(&self, world: &Coordinator, delta_time: f32) {
        let entities = self.slot.snapshot();
        self.slot.system.update(world, &entities, delta_time);
    }

    /// Runs [`System::render`] on the calling thread.
    pub fn render(&self, world: &Coordinator) {
        let entities = self.slot.snapshot();
        self.slot.system.render(world, &entities);
    }

    /// The pacing helper attached to this system.
    #[must_use]
    pub fn throttle(&self) -> &TickThrottle {
        &self.slot.throttle
    }

    /// Feeds `delta` to the system's throttle and, once an interval has
    /// elapsed with no update outstanding, hands `scheduler` a job that runs
    /// [`System::update`] with the interval as its delta.
    ///
    /// Returns `true` if a job was handed out.
    pub fn execute_when_possible<S>(&self, world: &Arc<Coordinator>, delta: f32, scheduler: S) -> bool
    where
        S: FnOnce(Job),
    {
        let slot = Arc::clone(&self.slot);
        let world = Arc::clone(world);
        self.slot.throttle.execute_when_possible(
            delta,
            move |interval| {
                let entities = slot.snapshot();
                slot.system.update(&world, &entities, interval);
            },
            scheduler,
        )
    }
}

/// Bookkeeping for one registered system.
struct SystemEntry {
    name: &'static str,
    signature: Signature,
    cache: Arc<dyn MembershipCache>,
    handle: Arc<dyn Any + Send + Sync>,
}

/// Owns system instances, their required signatures and membership caches.
pub struct SystemRegistry {
    systems: HashMap<TypeId, SystemEntry>,
    default_tick_rate: f32,
}

impl SystemRegistry {
    /// Creates an empty registry. New systems are paced at `default_tick_rate`.
    #[must_use]
    pub fn new(default_tick_rate: f32) -> Self {
        Self {
            systems: HashMap::new(),
            default_tick_rate,
        }
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Constructs and registers the single instance of `T`.
    ///
    /// If `T` is already registered the existing handle is returned.
    pub fn register<T: System + Default>(&mut self) -> SystemHandle<T> {
        if let Some(handle) = self.existing::<T>() {
            tracing::warn!(system = type_name::<T>(), "system registered twice");
            return handle;
        }
        self.insert(T::default())
    }

    /// Registers a caller-constructed instance of `T`.
    ///
    /// If `T` is already registered, `system` is dropped and the existing
    /// handle is returned.
    pub fn register_with<T: System>(&mut self, system: T) -> SystemHandle<T> {
        if let Some(handle) = self.existing::<T>() {
            tracing::warn!(system = type_name::<T>(), "system registered twice");
            return handle;
        }
        self.insert(system)
    }

    /// Looks up the handle of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::SystemNotRegistered`] if `T` is unknown.
    pub fn get<T: System>(&self) -> KernelResult<SystemHandle<T>> {
        self.existing::<T>().ok_or_else(not_registered::<T>)
    }

    /// Declares the components `T` requires.
    ///
    /// Existing members are not re-evaluated here; see [`SystemRegistry::resync`].
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::SystemNotRegistered`] if `T` is unknown.
    pub fn set_signature<T: System>(&mut self, signature: Signature) -> KernelResult<()> {
        let entry = self
            .systems
            .get_mut(&TypeId::of::<T>())
            .ok_or_else(not_registered::<T>)?;
        entry.signature = signature;
        tracing::debug!(system = entry.name, ?signature, "system signature set");
        Ok(())
    }

    /// Required signature of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::SystemNotRegistered`] if `T` is unknown.
    pub fn signature<T: System>(&self) -> KernelResult<Signature> {
        self.systems
            .get(&TypeId::of::<T>())
            .map(|entry| entry.signature)
            .ok_or_else(not_registered::<T>)
    }

    /// Rebuilds the membership of `T` from `(entity, signature)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::SystemNotRegistered`] if `T` is unknown.
    pub fn resync<T, I>(&mut self, population: I) -> KernelResult<()>
    where
        T: System,
        I: IntoIterator<Item = (Entity, Signature)>,
    {
        let entry = self
            .systems
            .get(&TypeId::of::<T>())
            .ok_or_else(not_registered::<T>)?;
        let members: BTreeSet<Entity> = population
            .into_iter()
            .filter(|(_, signature)| signature.matches(entry.signature))
            .map(|(entity, _)| entity)
            .collect();
        tracing::debug!(system = entry.name, members = members.len(), "system membership resynced");
        entry.cache.replace(members);
        Ok(())
    }

    /// Removes the entity from every system.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        for entry in self.systems.values() {
            entry.cache.evict(entity);
        }
    }

    /// Re-tests the entity against every system's required signature,
    /// admitting it on a match and evicting it otherwise.
    ///
    /// An empty signature means the entity no longer exists, so it is
    /// evicted everywhere, matching what [`SystemRegistry::resync`] computes.
    pub fn on_signature_changed(&mut self, entity: Entity, signature: Signature) {
        for entry in self.systems.values() {
            if !signature.is_empty() && signature.matches(entry.signature) {
                entry.cache.admit(entity);
            } else {
                entry.cache.evict(entity);
            }
        }
    }

    fn existing<T: System>(&self) -> Option<SystemHandle<T>> {
        let entry = self.systems.get(&TypeId::of::<T>())?;
        let slot = Arc::clone(&entry.handle).downcast::<SystemSlot<T>>().ok()?;
        Some(SystemHandle { slot })
    }

    fn insert<T: System>(&mut self, system: T) -> SystemHandle<T> {
        let slot = Arc::new(SystemSlot {
            system,
            members: RwLock::new(BTreeSet::new()),
            throttle: TickThrottle::new(self.default_tick_rate),
        });
        let name = type_name::<T>();
        self.systems.insert(
            TypeId::of::<T>(),
            SystemEntry {
                name,
                signature: Signature::EMPTY,
                cache: Arc::clone(&slot) as Arc<dyn MembershipCache>,
                handle: Arc::clone(&slot) as Arc<dyn Any + Send + Sync>,
            },
        );
        tracing::debug!(system = name, "registered system");
        SystemHandle { slot }
    }
}

fn not_registered<T: System>() -> KernelError {
    KernelError::SystemNotRegistered {
        name: type_name::<T>(),
    }
}
