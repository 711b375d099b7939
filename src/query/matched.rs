//! Per-table access plans.

use std::ptr::NonNull;

use crate::entity::Entity;
use crate::types::TypeId;

/// How to locate one signature column's data for a matched table.
///
/// Modelled as a tagged variant rather than a raw signed integer: the three cases are
/// mutually exclusive and a raw `i32` would let callers forget to check which one they have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSlot {
    /// No data: a tag, or a column forced absent by `Optional`.
    Tag,
    /// 1-based index into the table's own component columns.
    Column(usize),
    /// 1-based index into this record's `references` list.
    Reference(usize),
}

/// An indirection from a matched table's row to another entity's component data.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    /// The entity actually holding the component (a parent, a prefab ancestor, a named
    /// source entity, or a system). `Entity::from_id(0)` for an unresolved/root reference.
    pub entity: Entity,
    pub component: Entity,
    /// Populated by [`super::Query::resolve_references`]; `None` until first resolved, or
    /// if the holder could not be found.
    pub cached_ptr: Option<NonNull<u8>>,
}

/// The access plan compiled for one (query, table) match.
#[derive(Debug, Clone)]
pub struct MatchedTable {
    pub type_id: TypeId,
    /// One slot per signature column, in declared order.
    pub slots: Vec<PlanSlot>,
    /// The concrete component id resolved for each signature column (may differ per table
    /// under `Or`).
    pub components: Vec<Entity>,
    pub references: Vec<Reference>,
}
