//! Entity identifiers.
//!
//! An [`Entity`] is an opaque 64-bit handle. The high byte carries role/relation flags;
//! the low 56 bits are an identity. Components, prefabs and regular "game objects" all
//! live in the same id space -- a component is simply an entity that component metadata
//! happens to know the size of.
//!
//! [`CHILDOF`] is the only flag the core interprets directly: when set on a type element,
//! the low bits name the parent entity rather than a plain identity.
//!
//! # Architecture
//!
//! The core never allocates or frees entities itself -- that is the entity index's job,
//! consumed here only through the [`EntityIndex`] contract (see module docs on
//! [`crate::storage::table`] for how the table store uses it). This module defines the id
//! type and the trait boundary; a reference [`EntityIndex`] implementation sufficient for
//! tests lives in [`crate::world`].

use std::fmt;

use crate::storage::Row;
use crate::types::TypeId;

/// Marks a type element as a parent relation: the remaining bits name the parent entity.
pub const CHILDOF: u64 = 1 << 63;

const FLAG_MASK: u64 = 0xFF << 56;
const ID_MASK: u64 = !FLAG_MASK;

/// Opaque entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Entity(u64);

impl Entity {
    /// Construct an entity from a raw id, flags included.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Construct a plain identity entity (no flags) from a low-bits id.
    #[inline]
    pub const fn from_id(id: u64) -> Self {
        Self(id & ID_MASK)
    }

    /// The raw 64-bit value, flags included.
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// The identity portion, with any role/relation flags stripped.
    #[inline]
    pub const fn id(&self) -> u64 {
        self.0 & ID_MASK
    }

    #[inline]
    const fn has_flag(&self, flag: u64) -> bool {
        self.0 & flag != 0
    }

    /// True if this type element is a `CHILDOF` relation.
    #[inline]
    pub const fn is_childof(&self) -> bool {
        self.has_flag(CHILDOF)
    }

    /// Build the `CHILDOF` relation entity for the given parent.
    #[inline]
    pub const fn childof(parent: Entity) -> Entity {
        Entity(CHILDOF | parent.id())
    }

    /// The parent named by this entity, if it carries the `CHILDOF` flag.
    #[inline]
    pub fn parent(&self) -> Option<Entity> {
        self.is_childof().then(|| Entity::from_id(self.id()))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_childof() {
            write!(f, "CHILDOF({})", self.id())
        } else {
            write!(f, "{}", self.id())
        }
    }
}

impl From<u64> for Entity {
    #[inline]
    fn from(value: u64) -> Self {
        Entity::from_id(value)
    }
}

/// Entity index contract consumed by the core.
///
/// Owned externally by the world container. The core only ever asks where an entity
/// currently lives, registers entities whose structural change must invalidate cached
/// query references, and (on structural mutation) records an entity's new location.
///
/// `has_component` and `prefab_parent_of` extend the collaborator surface beyond entity
/// lookup and placement: prefab detection (table evaluation) must ask whether a type
/// element entity itself carries the `Prefab`/`PrefabParent` tags, which in turn requires
/// knowing that entity's own row -- the same facility the entity index already provides
/// for ordinary entities.
pub trait EntityIndex {
    /// The table and row currently holding `entity`, if it is alive.
    fn get_row(&self, entity: Entity) -> Option<(TypeId, Row)>;

    /// Mark `entity` as watched: its structural changes must invalidate any cached
    /// reference pointing at it.
    fn watch(&mut self, entity: Entity);

    /// Record that `entity` now lives at `row` within the table named by `type_id`.
    fn set_type_for_entity(&mut self, entity: Entity, type_id: TypeId, row: Row);

    /// True if `entity`'s current type contains `component`.
    fn has_component(&self, entity: Entity, component: Entity) -> bool;

    /// The parent recorded in `entity`'s `PrefabParent` component, if any.
    fn prefab_parent_of(&self, entity: Entity) -> Option<Entity>;
}
