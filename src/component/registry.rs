use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::component::ComponentMetadata;
use crate::entity::Entity;

/// A thread-safe registry mapping component entities to their element size.
///
/// Mirrors the concurrency trade-off used throughout this crate's collaborator
/// implementations: lock-free reads via `DashMap`, a write lock only taken on the rare
/// first registration of a given entity.
pub struct Registry {
    sizes: DashMap<Entity, usize>,
    order: RwLock<Vec<Entity>>,
    count: AtomicU32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sizes: DashMap::new(),
            order: RwLock::new(Vec::new()),
            count: AtomicU32::new(0),
        }
    }

    /// Register `component` with the given element size. Idempotent: re-registering the
    /// same entity with a different size overwrites the previous size.
    pub fn register(&self, component: Entity, size: usize) {
        if self.sizes.insert(component, size).is_none() {
            self.order.write().unwrap().push(component);
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of distinct entities registered as components.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ComponentMetadata for Registry {
    fn component_size(&self, component: Entity) -> Option<usize> {
        self.sizes.get(&component).map(|size| *size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u64) -> Entity {
        Entity::from_id(id)
    }

    #[test]
    fn registered_component_reports_its_size() {
        // Given
        let registry = Registry::new();

        // When
        registry.register(e(1), 8);

        // Then
        assert_eq!(registry.component_size(e(1)), Some(8));
    }

    #[test]
    fn unregistered_entity_reports_absent() {
        // Given
        let registry = Registry::new();

        // Then
        assert_eq!(registry.component_size(e(99)), None);
    }

    #[test]
    fn zero_size_tag_is_a_legal_registration() {
        // Given
        let registry = Registry::new();

        // When
        registry.register(e(5), 0);

        // Then
        assert_eq!(registry.component_size(e(5)), Some(0));
    }

    #[test]
    fn re_registering_does_not_grow_the_count() {
        // Given
        let registry = Registry::new();
        registry.register(e(1), 4);

        // When
        registry.register(e(1), 4);

        // Then
        assert_eq!(registry.len(), 1);
    }
}
