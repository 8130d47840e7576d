//! # Component Storage
//!
//! One homogeneous store per component type. Access is a single hash lookup
//! on a concretely typed map; type erasure only happens one level up, where
//! the registry keeps every store behind [`ErasedStore`] so it can broadcast
//! entity destruction without knowing the concrete types.

use std::any::{type_name, Any};
use std::collections::HashMap;

use super::component::Component;
use super::entity::Entity;

/// Storage for one statically typed component.
///
/// Holds at most one value per entity; iteration order is unspecified.
pub struct ComponentStore<T: Component> {
    components: HashMap<Entity, T>,
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
        }
    }

    /// Attaches `component` to the entity, replacing any previous value.
    ///
    /// Returns the previously attached value, if any.
    pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
        self.components.insert(entity, component)
    }

    /// Detaches the component from the entity.
    ///
    /// Removing a missing entry is not an error; it returns `None`.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        self.components.remove(&entity)
    }

    /// Returns `true` if the entity has a value in this store.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.components.contains_key(&entity)
    }

    /// Retrieves an immutable reference to the entity's component.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.components.get(&entity)
    }

    /// Retrieves a mutable reference to the entity's component.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(&entity)
    }

    /// Number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the store holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterates over all components with their entities.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.components.iter().map(|(entity, component)| (*entity, component))
    }

    /// Iterates over the entities that carry this component.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.components.keys().copied()
    }
}

/// Capability shared by every store regardless of its component type.
pub trait ErasedStore: Send + Sync {
    /// Drops the entity's entry, if present.
    fn on_entity_destroyed(&mut self, entity: Entity);

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rust type name of the stored component.
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting back to the concrete store.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting back to the concrete store.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn on_entity_destroyed(&mut self, entity: Entity) {
        self.components.remove(&entity);
    }

    fn len(&self) -> usize {
        self.components.len()
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let mut store = ComponentStore::new();
        let entity = Entity::from_raw(3);

        assert_eq!(store.insert(entity, Health(10)), None);
        assert_eq!(store.insert(entity, Health(7)), Some(Health(10)));
        assert_eq!(store.get(entity), Some(&Health(7)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut store: ComponentStore<Health> = ComponentStore::new();
        assert_eq!(store.remove(Entity::from_raw(1)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let mut store = ComponentStore::new();
        let entity = Entity::from_raw(0);
        store.insert(entity, Health(1));

        if let Some(health) = store.get_mut(entity) {
            health.0 += 41;
        }
        assert_eq!(store.get(entity), Some(&Health(42)));
    }

    #[test]
    fn test_iter_pairs_entities_with_components() {
        let mut store = ComponentStore::new();
        store.insert(Entity::from_raw(4), Health(40));
        store.insert(Entity::from_raw(2), Health(20));
        store.remove(Entity::from_raw(4));
        store.insert(Entity::from_raw(5), Health(50));

        let mut pairs: Vec<(Entity, u32)> = store.iter().map(|(entity, health)| (entity, health.0)).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(Entity::from_raw(2), 20), (Entity::from_raw(5), 50)]);

        let mut entities: Vec<Entity> = store.entities().collect();
        entities.sort_unstable();
        assert_eq!(entities, vec![Entity::from_raw(2), Entity::from_raw(5)]);
    }

    #[test]
    fn test_erased_destroy_broadcast() {
        let mut store = ComponentStore::new();
        store.insert(Entity::from_raw(0), Health(1));
        store.insert(Entity::from_raw(1), Health(2));

        let erased: &mut dyn ErasedStore = &mut store;
        erased.on_entity_destroyed(Entity::from_raw(0));
        erased.on_entity_destroyed(Entity::from_raw(9));
        assert_eq!(erased.len(), 1);
        assert!(erased.type_name().ends_with("Health"));

        let typed = erased
            .as_any()
            .downcast_ref::<ComponentStore<Health>>()
            .unwrap();
        assert!(typed.contains(Entity::from_raw(1)));
        assert!(!typed.contains(Entity::from_raw(0)));
    }
}
