//! A columnar, archetype-based entity/component store.
//!
//! Entities with the same exact set of components ([`types::Type`]) live together in one
//! [`storage::Table`]; adding or removing a component moves an entity to a different table.
//! Queries are declarative [`query::Signature`]s compiled once per table into a
//! [`query::MatchedTable`] access plan, so iterating a query never re-walks component lists.
//!
//! The core (`storage`, `query`, `prefab`) is generic over its collaborators --
//! [`entity::EntityIndex`], [`component::ComponentMetadata`], [`types::TypeInterner`],
//! [`prefab::PrefabIndex`] and [`prefab::PrefabResolver`] -- so it never depends on any
//! particular bookkeeping strategy. [`world::World`] is the reference implementation of all
//! five, used by this crate's own tests.

pub mod component;
pub mod entity;
pub mod error;
pub mod prefab;
pub mod query;
pub mod storage;
pub mod types;
pub mod world;
