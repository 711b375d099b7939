//! Multi-column entity storage for one exact component composition.
//!
//! A [`Table`] holds every entity that currently has exactly the same [`Type`] -- add or
//! remove a single component and the entity moves to a different table entirely. Entity ids
//! live in a dedicated vector rather than a type-erased [`Column`], since their Rust type is
//! always known; every component column's length tracks that vector's length.
//!
//! # Invariants
//! - `entities.len() == columns[i].len()` for every column
//! - at most one prefab ancestor per table ([`Table::eval_columns`])

use crate::component::ComponentMetadata;
use crate::entity::{Entity, EntityIndex};
use crate::error::Error;
use crate::prefab::PrefabIndex;
use crate::storage::{Column, Row};
use crate::types::{Type, TypeId};

/// The outcome of inserting one or more entities, used by the caller to decide whether to
/// notify registered systems and whether cached table/column references need re-resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Row of the first inserted entity.
    pub row: Row,
    /// The table went from empty to non-empty as a result of this insert.
    pub activated: bool,
    /// At least one column's backing memory moved; pointers into this table are stale.
    pub reallocated: bool,
}

/// The outcome of removing an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// The table went from non-empty to empty as a result of this removal.
    pub deactivated: bool,
    /// The entity that was swapped into the removed row, and the row it now occupies
    /// (which is always the row that was just vacated). `None` if the removed row was the
    /// last row in the table.
    pub moved: Option<(Entity, Row)>,
}

/// Prefab-related flags discovered by [`Table::eval_columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// This table's type itself carries the `Prefab` tag.
    pub is_prefab: bool,
    /// This table's entities share a common prefab ancestor.
    pub has_prefab: bool,
}

/// Columnar storage for every entity with a given [`Type`].
pub struct Table {
    type_id: TypeId,
    ty: Type,
    entities: Vec<Entity>,
    columns: Vec<Column>,
    flags: Flags,
    /// Systems matched against this table, notified on the empty/non-empty transition.
    frame_systems: Vec<Entity>,
}

impl Table {
    /// Create a new, empty table for `ty`. One column per type element; an element with no
    /// registered size (a tag, or a relation flag like `CHILDOF`) gets a zero-size column
    /// that still tracks length for uniform indexing.
    pub fn new(type_id: TypeId, ty: Type, metadata: &dyn ComponentMetadata) -> Self {
        let columns = ty
            .as_slice()
            .iter()
            .map(|&component| Column::new(metadata.component_size(component).unwrap_or(0)))
            .collect();
        Self {
            type_id,
            ty,
            entities: Vec::new(),
            columns,
            flags: Flags::default(),
            frame_systems: Vec::new(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[inline]
    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[inline]
    pub fn frame_systems(&self) -> &[Entity] {
        &self.frame_systems
    }

    /// Reported capacity, in rows currently dimensioned.
    pub fn rows_dimensioned(&self) -> usize {
        self.entities.capacity()
    }

    /// Total byte width of one row: the entity id plus every component column.
    ///
    /// The reference implementation this table is grounded on sums only as many columns as
    /// there are type elements, which (given the entity-id column is counted separately
    /// there) silently drops the last component's contribution -- almost certainly an
    /// off-by-one in a diagnostic-only routine. Nothing here depends on reproducing that,
    /// so this sums every column that actually exists.
    pub fn row_size(&self) -> usize {
        std::mem::size_of::<Entity>() + self.columns.iter().map(Column::element_size).sum::<usize>()
    }

    /// Register a system as interested in this table. Returns `true` if the table is
    /// already non-empty, signalling the caller should activate the system immediately
    /// rather than waiting for the next empty-to-non-empty transition.
    pub fn register_system(&mut self, system: Entity) -> bool {
        self.frame_systems.push(system);
        !self.is_empty()
    }

    /// Reserve capacity for at least `count` total rows, without changing the row count.
    /// The one operation that can report [`Error::OutOfMemory`] -- every other mutation
    /// grows implicitly and aborts on genuine allocator exhaustion, same as `Vec<T>`.
    pub fn dim(&mut self, count: usize) -> Result<(), Error> {
        let additional = count.saturating_sub(self.entities.len());
        self.entities
            .try_reserve(additional)
            .map_err(|_| Error::OutOfMemory)?;
        for column in &mut self.columns {
            let additional = count.saturating_sub(column.len());
            column
                .try_reserve(additional)
                .map_err(|_| Error::OutOfMemory)?;
        }
        Ok(())
    }

    /// Append one entity. The caller is responsible for writing component values into the
    /// returned row via the table's columns.
    pub fn insert(&mut self, entity: Entity) -> InsertOutcome {
        let was_empty = self.is_empty();
        self.entities.push(entity);
        let row = Row::new(self.entities.len() - 1);

        let mut reallocated = false;
        for column in &mut self.columns {
            let before = column.capacity();
            column.push_uninit();
            reallocated |= column.capacity() != before;
        }

        InsertOutcome {
            row,
            activated: was_empty,
            reallocated,
        }
    }

    /// Append `count` entities with contiguous ids starting at `first_entity`. Used when
    /// bulk-populating a table (e.g. instantiating `count` copies of a prefab).
    pub fn grow(&mut self, count: usize, first_entity: Entity) -> InsertOutcome {
        let was_empty = self.is_empty();
        let start = self.entities.len();
        self.entities
            .extend((0..count).map(|i| Entity::from_id(first_entity.id() + i as u64)));

        let mut reallocated = false;
        for column in &mut self.columns {
            let before = column.capacity();
            column.push_n_uninit(count);
            reallocated |= column.capacity() != before;
        }

        InsertOutcome {
            row: Row::new(start),
            activated: was_empty && count > 0,
            reallocated,
        }
    }

    /// Remove the entity at `row` via swap-remove: the last row is copied into its place.
    ///
    /// # Panics
    /// If `row` is out of bounds.
    pub fn delete(&mut self, row: Row) -> RemoveOutcome {
        let count = self.entities.len();
        assert!(count > 0, "internal error: delete on an empty table");
        let index = row.index();
        assert!(index < count, "internal error: row {index} out of bounds");

        let last = count - 1;
        let moved = (index != last).then(|| {
            let moved_entity = self.entities[last];
            self.entities[index] = moved_entity;
            (moved_entity, row)
        });
        self.entities.pop();

        for column in &mut self.columns {
            column.swap_remove(row);
        }

        RemoveOutcome {
            deactivated: self.is_empty(),
            moved,
        }
    }

    /// Evaluate this table's type for prefab membership (the descending-id walk described
    /// Discovers at most one shared prefab ancestor among the table's own type
    /// elements and registers it in `prefabs`.
    ///
    /// A type element only participates in prefab detection if it is not itself a
    /// registered component -- tags and relation ids are candidates, data-bearing
    /// components never are.
    ///
    /// # Panics
    /// If more than one distinct prefab ancestor is found (`MORE_THAN_ONE_PREFAB`): a
    /// programming error, not something callers can recover from.
    pub fn eval_columns(
        &mut self,
        metadata: &dyn ComponentMetadata,
        entities: &dyn EntityIndex,
        prefabs: &mut dyn PrefabIndex,
    ) {
        self.flags = Flags::default();
        let mut excluded_prefab: Option<Entity> = None;

        for &candidate in self.ty.iter_descending() {
            if candidate == crate::prefab::PREFAB {
                self.flags.is_prefab = true;
            }

            if metadata.component_size(candidate).is_some() {
                continue;
            }

            let carries_prefab_tag = entities.has_component(candidate, crate::prefab::PREFAB);
            if Some(candidate) != excluded_prefab && carries_prefab_tag {
                assert!(
                    !self.flags.has_prefab,
                    "table {:?} has more than one prefab ancestor",
                    self.type_id
                );
                self.flags.has_prefab = true;
                log::trace!("table {:?}: registering prefab ancestor {candidate}", self.type_id);
                prefabs.register_prefab(self.type_id, candidate);
            } else if let Some(parent) = entities.prefab_parent_of(candidate) {
                excluded_prefab = Some(parent);
            }
        }
    }
}
