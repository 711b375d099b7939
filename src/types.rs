//! Type interning.
//!
//! A [`Type`] is an ordered, deduplicated sequence of entity ids naming a component
//! composition: two equal sequences intern to the same [`TypeId`]. Ordering by raw id
//! is load-bearing, not cosmetic -- it makes membership tests binary-searchable, and it
//! guarantees that a prefab-related flag entity (assigned an id after the prefab it
//! qualifies) always sorts after that prefab (see [`crate::storage::table`] for why table
//! evaluation depends on this).
//!
//! Types are immutable once interned. Tables own their `Type` directly rather than an
//! opaque handle, so most of the type-interner surface (`type_index_of`, `type_contains`,
//! `type_has`) collapses to inherent `Type` methods; the [`TypeInterner`] trait is left
//! with the part that's genuinely cross-cutting: handing out a stable id for a given
//! sequence of entities.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::entity::Entity;

/// A handle to an interned [`Type`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for TypeId {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<usize> for TypeId {
    #[inline]
    fn from(value: usize) -> Self {
        Self::new(value as u32)
    }
}

/// An ordered, deduplicated sequence of entity ids naming a component composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Type(Vec<Entity>);

impl Type {
    /// The empty type.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Construct a type from entities in arbitrary order, sorting and deduplicating.
    pub fn new(mut entities: Vec<Entity>) -> Self {
        entities.sort();
        entities.dedup();
        Self(entities)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Entity] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `id` is a member of this type.
    #[inline]
    pub fn contains(&self, id: Entity) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// The ascending-order index of `id` within this type, if present.
    #[inline]
    pub fn index_of(&self, id: Entity) -> Option<usize> {
        self.0.binary_search(&id).ok()
    }

    /// True if every id in `other` is a member of this type.
    pub fn contains_all(&self, other: &Type) -> bool {
        other.0.iter().all(|id| self.contains(*id))
    }

    /// The first id of `other` (in `other`'s ascending order) found in this type, if any.
    ///
    /// Grounds `Or`-operator resolution: alternatives bind to the first member
    /// of the declared type found in the target table, using the type's own id ordering.
    pub fn first_of(&self, other: &Type) -> Option<Entity> {
        other.0.iter().find(|id| self.contains(**id)).copied()
    }

    /// Walk the type in descending id order.
    ///
    /// Required for prefab detection: a `PrefabParent` flag's id is assigned after the
    /// prefab entity it qualifies, so walking backwards means the flag is always seen
    /// before the prefab it excludes.
    pub fn iter_descending(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter().rev()
    }

    /// Return a new type with `id` merged in.
    pub fn with_added(&self, id: Entity) -> Type {
        let mut ids = self.0.clone();
        ids.push(id);
        Type::new(ids)
    }
}

/// Type interning contract consumed by the core.
///
/// Hands out a stable [`TypeId`] for a given [`Type`] value, sharing one id across equal
/// sequences. Safe for concurrent registration: lookups never block on other lookups,
/// only the rare first-registration of a brand-new composition takes a write lock --
/// the same trade-off [`crate::component::Registry`] makes for component ids.
pub trait TypeInterner {
    /// Find or create the id for `ty`.
    fn intern(&self, ty: Type) -> TypeId;

    /// The type named by a previously interned id.
    fn type_of(&self, id: TypeId) -> Option<Type>;

    /// Intern the type produced by adding `entity` to the type named by `id`.
    fn type_add(&self, id: TypeId, entity: Entity) -> (TypeId, Type) {
        let base = self.type_of(id).unwrap_or_else(Type::empty);
        let grown = base.with_added(entity);
        let new_id = self.intern(grown.clone());
        (new_id, grown)
    }
}

/// Default, thread-safe [`TypeInterner`].
pub struct Interner {
    by_type: DashMap<Type, TypeId>,
    types: RwLock<Vec<Type>>,
    next_id: AtomicU32,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            by_type: DashMap::new(),
            types: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
        }
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner for Interner {
    fn intern(&self, ty: Type) -> TypeId {
        if let Some(id) = self.by_type.get(&ty) {
            return *id;
        }

        match self.by_type.entry(ty.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => *entry.get(),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let id = TypeId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                let mut types = self.types.write().unwrap();
                types.push(ty);
                entry.insert(id);
                id
            }
        }
    }

    fn type_of(&self, id: TypeId) -> Option<Type> {
        self.types.read().unwrap().get(id.index()).cloned()
    }
}
