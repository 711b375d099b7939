//! Reference collaborator bundle and a minimal structural-mutation harness used by
//! this crate's own tests.
//!
//! None of this module is part of the core's contract -- the core only ever consumes the
//! [`EntityIndex`], [`crate::component::ComponentMetadata`], [`TypeInterner`], [`PrefabIndex`] and
//! [`PrefabResolver`] traits. [`World`] is one way to implement all five at once, wiring
//! [`component::Registry`] and [`types::Interner`] together with [`Storage`] and enough
//! bookkeeping to move entities between tables.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::component;
use crate::entity::{Entity, EntityIndex};
use crate::prefab::{PrefabIndex, PrefabResolver};
use crate::storage::{Row, Storage};
use crate::types::{self, Type, TypeId, TypeInterner};

/// Ties the table store, component metadata, type interner and prefab bookkeeping together
/// into the five collaborators the core consumes.
pub struct World {
    storage: Storage,
    components: component::Registry,
    types: types::Interner,
    rows: DashMap<Entity, (TypeId, Row)>,
    watched: DashMap<Entity, ()>,
    prefab_parents: DashMap<Entity, Entity>,
    prefabs_by_type: DashMap<TypeId, Entity>,
    next_entity: AtomicU64,
    /// Bumped whenever a table insert/grow reallocates a column, per the generation-counter
    /// design this crate adopts over a raw `should_resolve` flag. Callers compare this
    /// against the value captured at their last resolve to decide whether to re-resolve.
    generation: AtomicU64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            storage: Storage::new(),
            components: component::Registry::new(),
            types: types::Interner::new(),
            rows: DashMap::new(),
            watched: DashMap::new(),
            prefab_parents: DashMap::new(),
            prefabs_by_type: DashMap::new(),
            next_entity: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn components(&self) -> &component::Registry {
        &self.components
    }

    pub fn types(&self) -> &types::Interner {
        &self.types
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn register_component(&self, component: Entity, size: usize) {
        self.components.register(component, size);
    }

    /// Record that `child` is a prefab-parent of `parent` -- i.e. `child`'s type carries a
    /// `PrefabParent(parent)` relation, excluding `parent` from prefab detection. See
    /// [`crate::storage::Table::eval_columns`].
    pub fn set_prefab_parent(&self, child: Entity, parent: Entity) {
        self.prefab_parents.insert(child, parent);
    }

    /// Allocate a fresh entity and place it into the table for `ty`, creating that table
    /// (and evaluating its prefab flags) if this is the first entity of that composition.
    pub fn spawn(&mut self, ty: Type) -> Entity {
        let entity = Entity::from_id(self.next_entity.fetch_add(1, Ordering::Relaxed));
        self.insert_into(entity, ty);
        entity
    }

    /// Move `entity` into the table for `ty` (used by add/remove-component style
    /// structural changes; the caller is responsible for copying any component data that
    /// should survive the move).
    pub fn insert_into(&mut self, entity: Entity, ty: Type) -> (TypeId, Row) {
        let (type_id, table, created) =
            self.storage
                .get_or_create_table(ty, &self.types, &self.components);
        if created {
            let entity_index = EntityIndexView(self);
            table.eval_columns(&self.components, &entity_index, &mut PrefabIndexView(self));
        }

        let table = self.storage.get_mut(type_id).expect("just created or found");
        let outcome = table.insert(entity);
        if outcome.reallocated {
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            log::trace!("table {type_id:?} reallocated, bumping generation to {generation}");
        }

        self.rows.insert(entity, (type_id, outcome.row));
        (type_id, outcome.row)
    }

    /// Remove `entity` from storage entirely, updating the moved entity's row if a
    /// swap-remove occurred.
    pub fn despawn(&mut self, entity: Entity) {
        let Some((type_id, row)) = self.rows.remove(&entity).map(|(_, v)| v) else {
            return;
        };
        let Some(table) = self.storage.get_mut(type_id) else {
            return;
        };
        let outcome = table.delete(row);
        if let Some((moved_entity, new_row)) = outcome.moved {
            self.rows.insert(moved_entity, (type_id, new_row));
        }
    }
}

impl EntityIndex for World {
    fn get_row(&self, entity: Entity) -> Option<(TypeId, Row)> {
        self.rows.get(&entity).map(|r| *r)
    }

    fn watch(&mut self, entity: Entity) {
        self.watched.insert(entity, ());
    }

    fn set_type_for_entity(&mut self, entity: Entity, type_id: TypeId, row: Row) {
        self.rows.insert(entity, (type_id, row));
    }

    fn has_component(&self, entity: Entity, component: Entity) -> bool {
        let Some((type_id, _)) = self.get_row(entity) else {
            return false;
        };
        let Some(ty) = self.types.type_of(type_id) else {
            return false;
        };
        if ty.contains(component) {
            return true;
        }
        let mut current = type_id;
        while let Some(prefab) = self.prefabs_by_type.get(&current).map(|p| *p) {
            let Some((prefab_type_id, _)) = self.get_row(prefab) else {
                break;
            };
            let Some(prefab_ty) = self.types.type_of(prefab_type_id) else {
                break;
            };
            if prefab_ty.contains(component) {
                return true;
            }
            current = prefab_type_id;
        }
        false
    }

    fn prefab_parent_of(&self, entity: Entity) -> Option<Entity> {
        self.prefab_parents.get(&entity).map(|p| *p)
    }
}

impl PrefabIndex for World {
    fn register_prefab(&mut self, type_id: TypeId, prefab: Entity) {
        if let Some(existing) = self.prefabs_by_type.get(&type_id) {
            assert_eq!(
                *existing, prefab,
                "table {type_id:?} already has a different prefab registered"
            );
            return;
        }
        self.prefabs_by_type.insert(type_id, prefab);
    }

    fn prefab_for(&self, type_id: TypeId) -> Option<Entity> {
        self.prefabs_by_type.get(&type_id).map(|p| *p)
    }
}

impl PrefabResolver for World {
    fn find_entity_in_prefabs(
        &self,
        _starting: Entity,
        ty: &Type,
        component: Entity,
        excluded: Option<Entity>,
    ) -> Option<Entity> {
        let mut current = self.types.intern(ty.clone());
        loop {
            let prefab = self.prefabs_by_type.get(&current).map(|p| *p)?;
            if Some(prefab) == excluded {
                return None;
            }
            let (prefab_type_id, _) = self.get_row(prefab)?;
            let prefab_ty = self.types.type_of(prefab_type_id)?;
            if prefab_ty.contains(component) {
                return Some(prefab);
            }
            current = prefab_type_id;
        }
    }
}

/// Thin `&World` wrapper so [`Table::eval_columns`] can borrow entity-index behaviour
/// while `World::insert_into` still holds `&mut self.storage` for the table itself.
struct EntityIndexView<'a>(&'a World);

impl EntityIndex for EntityIndexView<'_> {
    fn get_row(&self, entity: Entity) -> Option<(TypeId, Row)> {
        self.0.get_row(entity)
    }
    fn watch(&mut self, _entity: Entity) {}
    fn set_type_for_entity(&mut self, _entity: Entity, _type_id: TypeId, _row: Row) {}
    fn has_component(&self, entity: Entity, component: Entity) -> bool {
        self.0.has_component(entity, component)
    }
    fn prefab_parent_of(&self, entity: Entity) -> Option<Entity> {
        self.0.prefab_parent_of(entity)
    }
}

struct PrefabIndexView<'a>(&'a World);

impl PrefabIndex for PrefabIndexView<'_> {
    fn register_prefab(&mut self, type_id: TypeId, prefab: Entity) {
        if let Some(existing) = self.0.prefabs_by_type.get(&type_id) {
            assert_eq!(
                *existing, prefab,
                "table {type_id:?} already has a different prefab registered"
            );
            return;
        }
        self.0.prefabs_by_type.insert(type_id, prefab);
    }
    fn prefab_for(&self, type_id: TypeId) -> Option<Entity> {
        self.0.prefabs_by_type.get(&type_id).map(|p| *p)
    }
}
