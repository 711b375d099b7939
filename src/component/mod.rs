//! Component metadata.
//!
//! In this engine a "component" is not a distinct kind of thing -- it is any entity that
//! component metadata happens to know the byte size of. The table store never deals in
//! Rust types: it asks [`ComponentMetadata::component_size`] for a component entity's
//! element size and allocates raw byte columns accordingly. Zero size (a pure tag,
//! or a relation flag like `CHILDOF`) and "not a component at all" are both legal answers and
//! are treated identically by the table store -- a zero-size placeholder column.
//!
//! [`Registry`] is the reference implementation used by [`crate::world::World`] and by
//! this crate's own tests; it is not part of the core's public contract, only
//! [`ComponentMetadata`] is.

mod registry;

pub use registry::Registry;

use crate::entity::Entity;

/// Component metadata contract consumed by the core.
pub trait ComponentMetadata {
    /// The element size, in bytes, of `component`'s data, or `None` if `component` is not
    /// a registered component (tag, relation flag, or unknown entity).
    fn component_size(&self, component: Entity) -> Option<usize>;
}
