//! Prefab tags and inheritance (table evaluation, prefab resolution).
//!
//! A prefab is an ordinary entity carrying the [`PREFAB`] tag; other entities inherit from
//! it by adding a `CHILDOF`-style relation to it in their own type. Table evaluation
//! ([`crate::storage::Table::eval_columns`]) discovers which (at most one) prefab a table's
//! entities share; actually reading an inherited component's value back through that prefab
//! chain is this module's job.

use crate::entity::Entity;
use crate::types::{Type, TypeId};

/// Tag marking an entity as a prefab template.
pub const PREFAB: Entity = Entity::from_id(1);

/// Tag marking an entity (prefab or otherwise) as inactive for matching purposes.
pub const DISABLED: Entity = Entity::from_id(2);

/// Registers which prefab (if any) a table's entities share, keyed by the table's type.
///
/// A distinct collaborator from [`crate::entity::EntityIndex`]: it is a world-level index
/// over tables rather than over individual entities, populated exactly once per table by
/// [`crate::storage::Table::eval_columns`] and consulted afterwards by prefab resolution.
pub trait PrefabIndex {
    /// Record that every entity in the table named by `type_id` shares `prefab` as its
    /// common ancestor. Called at most once per `type_id`; a second call for the same
    /// `type_id` with a different prefab is a `MORE_THAN_ONE_PREFAB` programming error and
    /// must panic rather than silently overwrite.
    fn register_prefab(&mut self, type_id: TypeId, prefab: Entity);

    /// The prefab registered for `type_id`, if any.
    fn prefab_for(&self, type_id: TypeId) -> Option<Entity>;
}

/// Looks up which entity in a prefab inheritance chain actually owns `component`.
///
/// Consumed by query matching when a signature column is satisfied through a `Shared`
/// source: the match records which table supplied the component, but the value itself must
/// be fetched from whichever prefab (possibly several `CHILDOF` hops up) actually has it.
pub trait PrefabResolver {
    /// Starting from `starting`, walk up the prefab chain recorded for `ty` looking for the
    /// first ancestor that owns `component`. `excluded`, if set, is skipped even if it would
    /// otherwise match (used when an owned column further down the chain already took
    /// precedence, see the owned-overrides-shared rule in table matching).
    fn find_entity_in_prefabs(
        &self,
        starting: Entity,
        ty: &Type,
        component: Entity,
        excluded: Option<Entity>,
    ) -> Option<Entity>;
}
